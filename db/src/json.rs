use bimap::BiMap;
use chrono::{DateTime, Duration, Utc};
use rand::{self, distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs::File,
    path::{Path, PathBuf},
};

use super::{
    password::{hash_password, verify_password},
    Database, DbError, NewCourse, NewUser, DEFAULT_SESSION_TTL_DAYS, PAGE_SIZE,
};
use crate::models::{Course, CourseId, User, UserId};

const TOKEN_LENGTH: usize = 25;

fn default_session_ttl() -> Duration {
    Duration::days(DEFAULT_SESSION_TTL_DAYS)
}

#[derive(Serialize, Deserialize)]
pub struct JSONDatabase {
    #[serde(skip)]
    filename: Option<PathBuf>,
    #[serde(skip, default = "default_session_ttl")]
    session_ttl: Duration,
    /// Keyed by normalized email
    users: HashMap<String, User>,
    /// token <-> email
    tokens: BiMap<String, String>,
    /// token -> login time; a token missing here is expired
    #[serde(default)]
    token_issued: HashMap<String, DateTime<Utc>>,
    courses: BTreeMap<CourseId, Course>,
    next_user_id: u32,
    next_course_id: u32,
}

impl JSONDatabase {
    /// Loads the database from disk, or creates an empty one if the file does not exist.
    pub fn open(filename: impl Into<PathBuf>) -> Result<Self, DbError> {
        let filename = filename.into();

        if !filename.exists() {
            log::info!("{} not found, starting with an empty database", filename.display());
            let db = Self {
                filename: Some(filename),
                ..Self::in_memory()
            };
            db.persist()?;
            return Ok(db);
        }

        let mut db = Self::from_file(&filename)?;
        db.filename = Some(filename);
        Ok(db)
    }

    /// A database that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            filename: None,
            session_ttl: default_session_ttl(),
            users: HashMap::new(),
            tokens: BiMap::new(),
            token_issued: HashMap::new(),
            courses: BTreeMap::new(),
            next_user_id: 0,
            next_course_id: 0,
        }
    }

    /// How long a login token stays valid.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    fn from_file(filename: &Path) -> Result<Self, DbError> {
        let contents = {
            let mut file = File::open(filename)?;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            contents
        };

        Ok(serde_json::from_str(&contents)?)
    }

    fn persist(&self) -> Result<(), DbError> {
        if let Some(filename) = &self.filename {
            let mut output = File::create(filename)?;
            write!(output, "{}", self.dump_as_json()?)?;
        }
        Ok(())
    }

    /// Persists the pending change, undoing it in memory with `rollback` when the write fails.
    fn commit(&mut self, rollback: impl FnOnce(&mut Self)) -> Result<(), DbError> {
        match self.persist() {
            Ok(()) => Ok(()),
            Err(err) => {
                rollback(self);
                Err(err)
            }
        }
    }

    fn session_expired(&self, token: &str, now: DateTime<Utc>) -> bool {
        match self.token_issued.get(token) {
            Some(issued) => now - *issued > self.session_ttl,
            None => true,
        }
    }

    fn purge_expired_sessions(&mut self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .tokens
            .left_values()
            .filter(|token| self.session_expired(token, now))
            .cloned()
            .collect();

        for token in &expired {
            self.tokens.remove_by_left(token);
            self.token_issued.remove(token);
        }

        if !expired.is_empty() {
            log::debug!("dropped {} expired sessions", expired.len());
        }
    }
}

impl Database for JSONDatabase {
    fn dump_as_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }

    fn auth_login(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<Option<(&User, String)>, DbError> {
        let email = match self.user_get(email) {
            Some(user) if verify_password(password, &user.password) => user.email.clone(),
            _ => return Ok(None),
        };

        self.purge_expired_sessions();

        // One live token per user
        let previous = match self.tokens.remove_by_right(&email) {
            Some((old, _)) => {
                let issued = self.token_issued.remove(&old);
                Some((old, issued))
            }
            None => None,
        };

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();

        self.tokens.insert(token.clone(), email.clone());
        self.token_issued.insert(token.clone(), Utc::now());

        let (issued_token, owner) = (token.clone(), email.clone());
        self.commit(move |db| {
            db.tokens.remove_by_left(&issued_token);
            db.token_issued.remove(&issued_token);

            if let Some((old, issued)) = previous {
                db.tokens.insert(old.clone(), owner);
                if let Some(issued) = issued {
                    db.token_issued.insert(old, issued);
                }
            }
        })?;

        Ok(self.user_get(&email).map(|user| (user, token)))
    }

    fn auth_logout(&mut self, token: &str) -> Result<bool, DbError> {
        let (token, email) = match self.tokens.remove_by_left(token) {
            Some(pair) => pair,
            None => return Ok(false),
        };
        let issued = self.token_issued.remove(&token);

        self.commit(move |db| {
            db.tokens.insert(token.clone(), email);
            if let Some(issued) = issued {
                db.token_issued.insert(token, issued);
            }
        })?;
        Ok(true)
    }

    fn auth_get_user(&self, token: &str) -> Option<&User> {
        let email = self.tokens.get_by_left(token)?;

        if self.session_expired(token, Utc::now()) {
            return None;
        }

        self.users.get(email)
    }

    fn user_add(&mut self, user: NewUser) -> Result<UserId, DbError> {
        let email = normalize_email(&user.email);

        if self.users.contains_key(&email) {
            return Err(DbError::EmailTaken);
        }

        let password = hash_password(&user.password).map_err(DbError::Hash)?;
        let id = UserId(self.next_user_id);
        self.users.insert(
            email.clone(),
            User {
                id,
                name: user.name,
                email: email.clone(),
                password,
                role: user.role,
                created_at: Utc::now(),
            },
        );
        self.next_user_id += 1;

        self.commit(move |db| {
            db.users.remove(&email);
            db.next_user_id -= 1;
        })?;
        Ok(id)
    }

    fn user_get(&self, email: &str) -> Option<&User> {
        self.users.get(&normalize_email(email))
    }

    fn user_get_by_id(&self, id: UserId) -> Option<&User> {
        self.users.values().find(|u| u.id == id)
    }

    fn user_count(&self, filter: impl Fn(&User) -> bool) -> usize {
        self.users.values().filter(|&u| filter(u)).count()
    }

    fn course_add(&mut self, course: NewCourse) -> Result<CourseId, DbError> {
        let id = CourseId(self.next_course_id);
        let now = Utc::now();

        self.courses.insert(
            id,
            Course {
                id,
                name: course.title.clone(),
                title: Some(course.title),
                description: course.description,
                teacher: course.teacher,
                students: BTreeSet::new(),
                thumbnail: course.thumbnail,
                videos: Vec::new(),
                materials: course.materials,
                notes: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        );
        self.next_course_id += 1;

        self.commit(move |db| {
            db.courses.remove(&id);
            db.next_course_id -= 1;
        })?;
        Ok(id)
    }

    fn course_get(&self, id: CourseId) -> Option<&Course> {
        self.courses.get(&id)
    }

    fn course_all(&self) -> Vec<&Course> {
        self.courses.values().collect()
    }

    fn course_find(&self, filter: impl Fn(&Course) -> bool) -> Vec<&Course> {
        self.courses.values().filter(|&c| filter(c)).collect()
    }

    fn course_list(&self, page: usize, query: Option<&str>) -> (usize, Vec<&Course>) {
        _search(
            self.courses.values(),
            |c: &Course| c.title.clone().unwrap_or_else(|| c.name.clone()),
            page,
            query,
        )
    }

    fn course_save(&mut self, course: Course) -> Result<(), DbError> {
        let id = course.id;
        let previous = self.courses.insert(id, course);

        self.commit(move |db| match previous {
            Some(previous) => {
                db.courses.insert(id, previous);
            }
            None => {
                db.courses.remove(&id);
            }
        })
    }

    fn course_remove(&mut self, id: CourseId) -> Result<bool, DbError> {
        let course = match self.courses.remove(&id) {
            Some(course) => course,
            None => return Ok(false),
        };

        self.commit(move |db| {
            db.courses.insert(id, course);
        })?;
        Ok(true)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn _search<'a, T, F>(
    collection: impl Iterator<Item = &'a T>,
    property: F,
    page: usize,
    query: Option<&str>,
) -> (usize, Vec<&'a T>)
where
    F: Fn(&T) -> String,
{
    let mut filter = contains_query(query, property);
    let mut total = 0;
    let mut skipped = 0;
    let mut results: Vec<&T> = Vec::new();
    let to_skip = page.saturating_sub(1).saturating_mul(PAGE_SIZE);

    for row in collection {
        if !filter(&row) {
            continue;
        }

        total += 1;

        if skipped < to_skip {
            skipped += 1;
        } else if results.len() < PAGE_SIZE {
            results.push(row);
        }
    }

    (total, results)
}

/// Returns a function to be used as a filter that checks if the provided query is contained in the
/// object string.
fn contains_query<T, F>(query: Option<&str>, property: F) -> impl FnMut(&&T) -> bool
where
    F: Fn(&T) -> String,
{
    let normalize = |s: &str| unidecode::unidecode(s.trim()).to_ascii_lowercase();
    let query = query.map(|d| truncate(d, 50)).map(normalize);

    move |object: &&T| {
        if let Some(query) = &query {
            let name = property(object);
            let name = normalize(&name);
            name.contains(query)
        } else {
            true
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((idx, _)) => &s[..idx],
    }
}
