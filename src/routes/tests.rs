use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use warp::{http::StatusCode, Filter, Reply};

use super::api;
use crate::uploads::{Uploads, THUMBNAIL_MAX_BYTES};
use db::{Db, JSONDatabase};

const BOUNDARY: &str = "------------------------course-platform-test";

struct TestServer {
    db: Db,
    uploads: Uploads,
    dir: TempDir,
}

impl TestServer {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let uploads = Uploads::new(dir.path());
        uploads.ensure_dirs().await.unwrap();

        Self {
            db: Arc::new(Mutex::new(JSONDatabase::in_memory())),
            uploads,
            dir,
        }
    }

    /// Number of files stored under one of the upload directories
    fn stored_files(&self, kind_dir: &str) -> usize {
        std::fs::read_dir(self.dir.path().join(kind_dir))
            .unwrap()
            .count()
    }

    fn filter(&self) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
        api(&self.db, &self.uploads)
    }

    async fn send(&self, request: warp::test::RequestBuilder) -> (StatusCode, Value) {
        let response = request.reply(&self.filter()).await;
        let status = response.status();
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (status, body)
    }

    async fn register(&self, name: &str, role: &str) -> String {
        let email = format!("{}@example.com", name.to_lowercase());

        let (status, _) = self
            .send(
                warp::test::request()
                    .method("POST")
                    .path("/api/register")
                    .json(&json!({
                        "name": name,
                        "email": email,
                        "password": "password1",
                        "role": role,
                    })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .send(
                warp::test::request()
                    .method("POST")
                    .path("/api/session")
                    .json(&json!({ "email": email, "password": "password1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        body["token"].as_str().unwrap().to_string()
    }

    async fn create_course(&self, token: &str, title: &str) -> u64 {
        let (status, body) = self
            .send(multipart(
                "POST",
                "/api/courses",
                token,
                &[Part::Text("title", title), Part::Text("description", "Intro")],
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        body["id"].as_u64().unwrap()
    }

    async fn post(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(authorized("POST", path, token)).await
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let request = match token {
            Some(token) => authorized("GET", path, token),
            None => warp::test::request().method("GET").path(path),
        };
        self.send(request).await
    }
}

fn authorized(method: &str, path: &str, token: &str) -> warp::test::RequestBuilder {
    warp::test::request()
        .method(method)
        .path(path)
        .header("authorization", format!("Bearer {}", token))
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(method: &str, path: &str, token: &str, parts: &[Part]) -> warp::test::RequestBuilder {
    let mut body: Vec<u8> = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    authorized(method, path, token)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
}

#[tokio::test]
async fn register_rejects_duplicates_and_weak_input() {
    let server = TestServer::new().await;
    server.register("Ada", "student").await;

    let cases = vec![
        (
            json!({"name": "Ada", "email": "ADA@example.com", "password": "password1", "role": "student"}),
            StatusCode::CONFLICT,
            "UserAlreadyExists",
        ),
        (
            json!({"name": "Bob", "email": "bob", "password": "password1", "role": "student"}),
            StatusCode::BAD_REQUEST,
            "InvalidEmail",
        ),
        (
            json!({"name": "Bob", "email": "bob@example.com", "password": "123", "role": "student"}),
            StatusCode::BAD_REQUEST,
            "PasswordTooSimple",
        ),
        (
            json!({"name": "Bob", "email": "bob@example.com", "password": "password1", "role": "admin"}),
            StatusCode::BAD_REQUEST,
            "MalformedData",
        ),
    ];

    for (request, expected_status, expected_code) in cases {
        let (status, body) = server
            .send(
                warp::test::request()
                    .method("POST")
                    .path("/api/register")
                    .json(&request),
            )
            .await;
        assert_eq!(status, expected_status, "{}", request);
        assert_eq!(body["code"], expected_code, "{}", request);
    }
}

#[tokio::test]
async fn wrong_password_is_forbidden() {
    let server = TestServer::new().await;
    server.register("Ada", "student").await;

    let (status, body) = server
        .send(
            warp::test::request()
                .method("POST")
                .path("/api/session")
                .json(&json!({ "email": "ada@example.com", "password": "wrong" })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "InvalidCredentials");
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let server = TestServer::new().await;
    let token = server.register("Ada", "student").await;

    let (status, _) = server
        .send(authorized("DELETE", "/api/session", &token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.get("/api/my-courses", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NotAuthenticated");
}

#[tokio::test]
async fn enrollment_round_trip() {
    let server = TestServer::new().await;
    let teacher = server.register("Turing", "teacher").await;
    let student = server.register("Ada", "student").await;
    let id = server.create_course(&teacher, "Algebra").await;

    let (status, _) = server
        .post(&format!("/api/courses/{}/enroll", id), &student)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.get(&format!("/api/courses/{}", id), Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course"]["studentsCount"], 1);
    assert_eq!(body["course"]["teacher"]["name"], "Turing");
    assert_eq!(body["is_enrolled"], true);

    let (status, body) = server
        .post(&format!("/api/courses/{}/enroll", id), &student)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "info");
    assert_eq!(body["code"], "AlreadyEnrolled");

    let (_, body) = server.get("/api/my-courses", Some(&student)).await;
    assert_eq!(body["enrolled_courses"].as_array().unwrap().len(), 1);
    assert!(body["teaching_courses"].as_array().unwrap().is_empty());

    for _ in 0..2 {
        let (status, _) = server
            .post(&format!("/api/courses/{}/unenroll", id), &student)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    // No longer enrolled, so the detail page is closed to the student
    let (status, body) = server.get(&format!("/api/courses/{}", id), Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NotEnrolled");

    let (status, body) = server.get(&format!("/api/courses/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course"]["studentsCount"], 0);
}

#[tokio::test]
async fn teachers_cannot_enroll() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    let colleague = server.register("Hopper", "teacher").await;
    let id = server.create_course(&owner, "Algebra").await;

    let (status, body) = server
        .post(&format!("/api/courses/{}/enroll", id), &owner)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "SelfEnrollmentDenied");

    let (status, body) = server
        .post(&format!("/api/courses/{}/enroll", id), &colleague)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");
}

#[tokio::test]
async fn enrolling_requires_a_session_and_a_course() {
    let server = TestServer::new().await;
    let student = server.register("Ada", "student").await;

    let (status, body) = server
        .send(warp::test::request().method("POST").path("/api/courses/0/enroll"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NotAuthenticated");

    let (status, body) = server.post("/api/courses/99/enroll", &student).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CourseNotFound");
}

#[tokio::test]
async fn students_cannot_create_or_change_courses() {
    let server = TestServer::new().await;
    let teacher = server.register("Turing", "teacher").await;
    let student = server.register("Ada", "student").await;
    let id = server.create_course(&teacher, "Algebra").await;

    let (status, body) = server
        .send(multipart(
            "POST",
            "/api/courses",
            &student,
            &[Part::Text("title", "Hijack")],
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");

    let (status, body) = server
        .send(multipart(
            "PUT",
            &format!("/api/courses/{}", id),
            &student,
            &[Part::Text("title", "Hijack")],
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");

    let (status, _) = server
        .send(authorized("DELETE", &format!("/api/courses/{}", id), &student))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .get(&format!("/api/courses/{}/edit", id), Some(&student))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_the_owner_edits_and_deletes() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    let colleague = server.register("Hopper", "teacher").await;
    let id = server.create_course(&owner, "Algebra").await;
    let path = format!("/api/courses/{}", id);

    let (status, body) = server
        .send(authorized("DELETE", &path, &colleague))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NotAuthorized");

    let (status, body) = server
        .get(&format!("/api/courses/{}/edit", id), Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course"]["title"], "Algebra");

    let (status, _) = server
        .send(multipart(
            "PUT",
            &path,
            &owner,
            &[
                Part::Text("title", "Linear Algebra"),
                Part::File("thumbnail", "cover.png", b"png"),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.get(&path, None).await;
    assert_eq!(body["course"]["name"], "Linear Algebra");
    assert_eq!(body["course"]["title"], "Linear Algebra");
    assert!(body["course"]["description"].is_null());
    let thumbnail = body["course"]["thumbnail"].as_str().unwrap();
    assert!(thumbnail.starts_with("/uploads/course_thumbnails/"));

    let (status, _) = server.send(authorized("DELETE", &path, &owner)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.get(&path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CourseNotFound");
}

#[tokio::test]
async fn uploaded_material_is_recorded_and_served() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    let id = server.create_course(&owner, "Algebra").await;

    let (status, _) = server
        .send(multipart(
            "POST",
            &format!("/api/courses/{}/upload", id),
            &owner,
            &[Part::File("file", "syllabus.pdf", b"%PDF-1.4")],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.get(&format!("/api/courses/{}", id), None).await;
    let materials = body["course"]["materials"].as_array().unwrap();
    assert_eq!(materials.len(), 1);
    let path = materials[0].as_str().unwrap();
    assert!(path.ends_with(".pdf"));

    let response = warp::test::request()
        .path(path)
        .reply(&server.filter())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), b"%PDF-1.4");
}

#[tokio::test]
async fn create_rejects_unexpected_files_and_missing_title() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;

    let (status, body) = server
        .send(multipart(
            "POST",
            "/api/courses",
            &owner,
            &[
                Part::Text("title", "Algebra"),
                Part::File("avatar", "me.png", b"png"),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UnexpectedField");

    let (status, body) = server
        .send(multipart(
            "POST",
            "/api/courses",
            &owner,
            &[Part::Text("description", "No title")],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MissingTitle");

    let (_, body) = server.get("/api/courses", None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn home_page_statistics() {
    let server = TestServer::new().await;
    let turing = server.register("Turing", "teacher").await;
    server.register("Hopper", "teacher").await;
    let ada = server.register("Ada", "student").await;
    let bob = server.register("Bob", "student").await;

    let algebra = server.create_course(&turing, "Algebra").await;
    let geometry = server.create_course(&turing, "Geometry").await;
    server.create_course(&turing, "Topology").await;
    server.create_course(&turing, "Logic").await;

    for token in &[&ada, &bob] {
        server
            .post(&format!("/api/courses/{}/enroll", geometry), token)
            .await;
    }
    server
        .post(&format!("/api/courses/{}/enroll", algebra), &ada)
        .await;

    let (status, body) = server.get("/api/home", Some(&ada)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"], json!({"students": 3, "instructors": 2, "courses": 4}));
    assert_eq!(body["user"]["name"], "Ada");

    let names: Vec<&str> = body["courses"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Geometry", "Algebra", "Topology"]);

    let (_, body) = server.get("/api/top-courses", None).await;
    assert_eq!(body["courses"].as_array().unwrap().len(), 3);

    let (_, body) = server.get("/api/home", None).await;
    assert!(body["user"].is_null());
}

#[tokio::test]
async fn course_catalogue_search() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    server.create_course(&owner, "Algebra").await;
    server.create_course(&owner, "Géométrie").await;

    let (status, body) = server.get("/api/courses?query=geometrie", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["courses"][0]["name"], "Géométrie");
}

#[tokio::test]
async fn profile_lists_taught_courses() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    server.create_course(&owner, "Algebra").await;

    let (status, body) = server.get("/api/profile", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "teacher");
    assert_eq!(body["teaching_courses"].as_array().unwrap().len(), 1);
    assert!(body["enrolled_courses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_routes_are_json_not_found() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");
}

#[tokio::test]
async fn files_are_not_written_without_permission() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    let colleague = server.register("Hopper", "teacher").await;
    let student = server.register("Ada", "student").await;
    let id = server.create_course(&owner, "Algebra").await;

    let (status, body) = server
        .send(multipart(
            "POST",
            &format!("/api/courses/{}/upload", id),
            &colleague,
            &[Part::File("file", "notes.pdf", b"%PDF-1.4")],
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NotAuthorized");

    let (status, body) = server
        .send(multipart(
            "POST",
            "/api/courses",
            &student,
            &[
                Part::Text("title", "Hijack"),
                Part::File("thumbnail", "cover.png", b"png"),
                Part::File("materials", "notes.pdf", b"%PDF-1.4"),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");

    let (status, _) = server
        .send(multipart(
            "PUT",
            &format!("/api/courses/{}", id),
            &colleague,
            &[
                Part::Text("title", "Hijack"),
                Part::File("thumbnail", "cover.png", b"png"),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(server.stored_files("course_materials"), 0);
    assert_eq!(server.stored_files("course_thumbnails"), 0);
}

#[tokio::test]
async fn oversized_thumbnail_is_refused() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    let id = server.create_course(&owner, "Algebra").await;
    let too_large = vec![0u8; THUMBNAIL_MAX_BYTES + 1];

    let (status, body) = server
        .send(multipart(
            "PUT",
            &format!("/api/courses/{}", id),
            &owner,
            &[
                Part::Text("title", "Algebra"),
                Part::File("thumbnail", "cover.png", &too_large),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "FileTooLarge");

    let (_, body) = server.get(&format!("/api/courses/{}", id), None).await;
    assert!(body["course"]["thumbnail"].is_null());
    assert_eq!(server.stored_files("course_thumbnails"), 0);
}

#[tokio::test]
async fn huge_page_number_is_an_empty_page() {
    let server = TestServer::new().await;
    let owner = server.register("Turing", "teacher").await;
    server.create_course(&owner, "Algebra").await;

    let (status, body) = server
        .get(&format!("/api/courses?page={}", usize::MAX), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body["courses"].as_array().unwrap().is_empty());
}
