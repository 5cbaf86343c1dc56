use serde::Serialize;
use warp::{http::StatusCode, multipart::FormData, Filter, Rejection, Reply};

use super::globals::{
    course_failure, io_failure, storage_failure, success, upload_failure, CourseResponse,
    ErrorCode, FailureResponse, PaginatedQueryableListRequest, SimpleSuccessResponse,
};
use crate::enrollment::{self, course_access};
use crate::error::CourseError;
use crate::ownership::{authorize_create, authorize_mutation, CourseAction};
use crate::uploads::{
    FileField, Form, UploadKind, Uploads, MATERIAL_MAX_BYTES, THUMBNAIL_MAX_BYTES,
};
use db::{
    models::{CourseId, User},
    Database, Db, NewCourse,
};
use filters::{authed, maybe_authed, with_db, with_shared};

const CREATE_FIELDS: [FileField; 2] = [
    FileField {
        name: "thumbnail",
        kind: UploadKind::Thumbnail,
        max_count: 1,
    },
    FileField {
        name: "materials",
        kind: UploadKind::Material,
        max_count: 5,
    },
];

const EDIT_FIELDS: [FileField; 1] = [FileField {
    name: "thumbnail",
    kind: UploadKind::Thumbnail,
    max_count: 1,
}];

const UPLOAD_FIELDS: [FileField; 1] = [FileField {
    name: "file",
    kind: UploadKind::Material,
    max_count: 1,
}];

/// Room for the text fields around the files
const FORM_OVERHEAD: u64 = 64 * 1024;

pub fn routes(
    db: &Db,
    uploads: &Uploads,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_route = warp::path!("api" / "courses")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and(warp::query::<PaginatedQueryableListRequest>())
        .and_then(list)
        .boxed();

    let create_route = warp::path!("api" / "courses")
        .and(warp::post())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(with_shared(uploads.clone()))
        .and(warp::multipart::form().max_length(
            (THUMBNAIL_MAX_BYTES + 5 * MATERIAL_MAX_BYTES) as u64 + FORM_OVERHEAD,
        ))
        .and_then(create)
        .boxed();

    let get_route = warp::path!("api" / "courses" / u32)
        .and(warp::get())
        .and(maybe_authed(db))
        .and(with_db(db.clone()))
        .and_then(get)
        .boxed();

    let edit_form_route = warp::path!("api" / "courses" / u32 / "edit")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(edit_form)
        .boxed();

    let update_route = warp::path!("api" / "courses" / u32)
        .and(warp::put())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(with_shared(uploads.clone()))
        .and(warp::multipart::form().max_length(THUMBNAIL_MAX_BYTES as u64 + FORM_OVERHEAD))
        .and_then(update)
        .boxed();

    let upload_route = warp::path!("api" / "courses" / u32 / "upload")
        .and(warp::post())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(with_shared(uploads.clone()))
        .and(warp::multipart::form().max_length(MATERIAL_MAX_BYTES as u64 + FORM_OVERHEAD))
        .and_then(upload)
        .boxed();

    let delete_route = warp::path!("api" / "courses" / u32)
        .and(warp::delete())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(delete)
        .boxed();

    let enroll_route = warp::path!("api" / "courses" / u32 / "enroll")
        .and(warp::post())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(enroll)
        .boxed();

    let unenroll_route = warp::path!("api" / "courses" / u32 / "unenroll")
        .and(warp::post())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and_then(unenroll)
        .boxed();

    list_route
        .or(create_route)
        .or(get_route)
        .or(edit_form_route)
        .or(update_route)
        .or(upload_route)
        .or(delete_route)
        .or(enroll_route)
        .or(unenroll_route)
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    total: usize,
    courses: Vec<CourseResponse<'a>>,
}

#[derive(Serialize)]
struct CreatedResponse {
    status: &'static str,
    id: CourseId,
}

#[derive(Serialize)]
struct GetResponse<'a> {
    status: &'static str,
    course: CourseResponse<'a>,
    is_teacher: bool,
    is_enrolled: bool,
}

#[derive(Serialize)]
struct CourseEnvelope<'a> {
    status: &'static str,
    course: CourseResponse<'a>,
}

async fn list(
    db: Db,
    request: PaginatedQueryableListRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let db = &*db;

    let page = request.normalized_page_number();
    let (total, courses) = db.course_list(page, request.query.as_deref());

    Ok(success(&ListResponse {
        status: "success",
        total,
        courses: CourseResponse::from_list(db, courses),
    }))
}

async fn create(
    user: User,
    db: Db,
    uploads: Uploads,
    form: FormData,
) -> Result<impl warp::Reply, warp::Rejection> {
    if let Err(err) = authorize_create(&user) {
        return Ok(course_failure(&err));
    }

    let mut form = match Form::read(form, &CREATE_FIELDS).await {
        Ok(form) => form,
        Err(err) => return Ok(upload_failure(&err)),
    };

    let title = match form.text("title") {
        Some(title) => title.to_string(),
        None => {
            return Ok(FailureResponse::new_reply(
                ErrorCode::MissingTitle,
                StatusCode::BAD_REQUEST,
            ))
        }
    };
    let description = form.text("description").map(str::to_string);

    let thumbnail = match uploads.store_all(&form.take_files("thumbnail")).await {
        Ok(paths) => paths,
        Err(err) => return Ok(io_failure(&err)),
    };
    let materials = match uploads.store_all(&form.take_files("materials")).await {
        Ok(paths) => paths,
        Err(err) => {
            uploads.discard(&thumbnail).await;
            return Ok(io_failure(&err));
        }
    };
    let written: Vec<String> = thumbnail.iter().chain(&materials).cloned().collect();

    let course = NewCourse {
        title,
        description,
        teacher: user.id,
        thumbnail: thumbnail.into_iter().next(),
        materials,
    };

    let created = db.lock().await.course_add(course);

    match created {
        Ok(id) => {
            log::info!("teacher {} created course {}", user.id, id);
            Ok(warp::reply::with_status(
                warp::reply::json(&CreatedResponse {
                    status: "success",
                    id,
                }),
                StatusCode::CREATED,
            ))
        }
        Err(err) => {
            uploads.discard(&written).await;
            Ok(storage_failure(&err))
        }
    }
}

/// Runs the ownership check, holding the store only for the check itself.
async fn check_mutation(
    db: &Db,
    id: CourseId,
    user: &User,
    action: CourseAction,
) -> Result<(), CourseError> {
    let db = db.lock().await;
    let course = db.course_get(id).ok_or(CourseError::NotFound)?;
    authorize_mutation(course, user, action)
}

async fn get(id: u32, user: Option<User>, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let db = &*db;

    let course = match db.course_get(CourseId(id)) {
        Some(course) => course,
        None => return Ok(course_failure(&CourseError::NotFound)),
    };

    match course_access(course, user.as_ref()) {
        Ok(access) => Ok(success(&GetResponse {
            status: "success",
            course: CourseResponse::new(db, course),
            is_teacher: access.is_teacher,
            is_enrolled: access.is_enrolled,
        })),
        Err(err) => Ok(course_failure(&err)),
    }
}

async fn edit_form(id: u32, user: User, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let db = &*db;

    let course = match db.course_get(CourseId(id)) {
        Some(course) => course,
        None => return Ok(course_failure(&CourseError::NotFound)),
    };

    match authorize_mutation(course, &user, CourseAction::EditForm) {
        Ok(()) => Ok(success(&CourseEnvelope {
            status: "success",
            course: CourseResponse::new(db, course),
        })),
        Err(err) => Ok(course_failure(&err)),
    }
}

async fn update(
    id: u32,
    user: User,
    db: Db,
    uploads: Uploads,
    form: FormData,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = CourseId(id);

    let mut form = match Form::read(form, &EDIT_FIELDS).await {
        Ok(form) => form,
        Err(err) => return Ok(upload_failure(&err)),
    };

    if let Err(err) = check_mutation(&db, id, &user, CourseAction::Edit).await {
        return Ok(course_failure(&err));
    }

    let title = match form.text("title") {
        Some(title) => title.to_string(),
        None => {
            return Ok(FailureResponse::new_reply(
                ErrorCode::MissingTitle,
                StatusCode::BAD_REQUEST,
            ))
        }
    };
    let description = form.text("description").map(str::to_string);

    let thumbnail = match uploads.store_all(&form.take_files("thumbnail")).await {
        Ok(paths) => paths,
        Err(err) => return Ok(io_failure(&err)),
    };

    let mut db = db.lock().await;

    // The course may have been deleted while the file was written
    let course = db.course_get(id).cloned();
    let mut course = match course {
        Some(course) => course,
        None => {
            drop(db);
            uploads.discard(&thumbnail).await;
            return Ok(course_failure(&CourseError::NotFound));
        }
    };

    course.set_title(title);
    course.description = description;
    if let Some(path) = thumbnail.first() {
        course.thumbnail = Some(path.clone());
    }
    course.touch();

    let saved = db.course_save(course);
    drop(db);

    match saved {
        Ok(()) => {
            log::info!("teacher {} edited course {}", user.id, id);
            Ok(success(&SimpleSuccessResponse::new()))
        }
        Err(err) => {
            uploads.discard(&thumbnail).await;
            Ok(storage_failure(&err))
        }
    }
}

async fn upload(
    id: u32,
    user: User,
    db: Db,
    uploads: Uploads,
    form: FormData,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = CourseId(id);

    let mut form = match Form::read(form, &UPLOAD_FIELDS).await {
        Ok(form) => form,
        Err(err) => return Ok(upload_failure(&err)),
    };

    if let Err(err) = check_mutation(&db, id, &user, CourseAction::Upload).await {
        return Ok(course_failure(&err));
    }

    let files = form.take_files("file");

    // Submitting the form without a file changes nothing
    if files.is_empty() {
        return Ok(success(&SimpleSuccessResponse::new()));
    }

    let paths = match uploads.store_all(&files).await {
        Ok(paths) => paths,
        Err(err) => return Ok(io_failure(&err)),
    };

    let mut db = db.lock().await;

    let course = db.course_get(id).cloned();
    let mut course = match course {
        Some(course) => course,
        None => {
            drop(db);
            uploads.discard(&paths).await;
            return Ok(course_failure(&CourseError::NotFound));
        }
    };

    course.materials.extend(paths.iter().cloned());
    course.touch();

    let saved = db.course_save(course);
    drop(db);

    match saved {
        Ok(()) => {
            log::info!("teacher {} uploaded material to course {}", user.id, id);
            Ok(success(&SimpleSuccessResponse::new()))
        }
        Err(err) => {
            uploads.discard(&paths).await;
            Ok(storage_failure(&err))
        }
    }
}

async fn delete(id: u32, user: User, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;

    let course = match db.course_get(CourseId(id)) {
        Some(course) => course,
        None => return Ok(course_failure(&CourseError::NotFound)),
    };

    if let Err(err) = authorize_mutation(course, &user, CourseAction::Delete) {
        return Ok(course_failure(&err));
    }

    match db.course_remove(CourseId(id)) {
        Ok(_) => {
            log::info!("teacher {} deleted course {}", user.id, id);
            Ok(success(&SimpleSuccessResponse::new()))
        }
        Err(err) => Ok(storage_failure(&err)),
    }
}

async fn enroll(id: u32, user: User, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;

    match enrollment::enroll(&mut *db, CourseId(id), &user) {
        Ok(()) => Ok(success(&SimpleSuccessResponse::new())),
        Err(err) => Ok(course_failure(&err)),
    }
}

async fn unenroll(id: u32, user: User, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;

    match enrollment::unenroll(&mut *db, CourseId(id), &user) {
        Ok(()) => Ok(success(&SimpleSuccessResponse::new())),
        Err(err) => Ok(course_failure(&err)),
    }
}
