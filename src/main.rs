use fern::colors::{Color, ColoredLevelConfig};
use warp::Filter;

mod config;
mod enrollment;
mod error;
mod ownership;
mod routes;
mod stats;
mod uploads;

#[cfg(test)]
mod test_support;

use config::Config;
use db::new_db;
use routes::api;
use uploads::Uploads;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };

    if let Err(err) = setup_logging(config.log_level) {
        eprintln!("could not apply logging configuration: {}", err);
        std::process::exit(2);
    }

    let global_db = match new_db(&config.db_path, config.session_ttl) {
        Ok(db) => db,
        Err(err) => {
            log::error!("could not open {}: {}", config.db_path.display(), err);
            std::process::exit(1);
        }
    };

    let uploads = Uploads::new(&config.upload_dir);
    if let Err(err) = uploads.ensure_dirs().await {
        log::error!(
            "could not create upload directories in {}: {}",
            config.upload_dir.display(),
            err
        );
        std::process::exit(1);
    }

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_headers(vec!["content-type", "Authorization"]);

    let filters = api(&global_db, &uploads)
        .with(cors)
        .with(warp::log("course_platform"));

    log::info!("listening on http://{}", config.address);
    warp::serve(filters).run(config.address).await;
}

fn setup_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    let colors = ColoredLevelConfig::new().debug(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}{} {}",
                colors.color(record.level()),
                chrono::Local::now().format("[%H:%M:%S]"),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
}
