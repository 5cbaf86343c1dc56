//! Fixtures shared by the unit tests.

use db::{
    models::{Course, CourseId, Role, User},
    Database, JSONDatabase, NewCourse, NewUser,
};

pub const PASSWORD: &str = "password1";

pub fn user(db: &mut JSONDatabase, email: &str, role: Role) -> User {
    let id = db
        .user_add(NewUser {
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            password: PASSWORD.to_string(),
            role,
        })
        .unwrap();

    db.user_get_by_id(id).unwrap().clone()
}

pub fn teacher(db: &mut JSONDatabase, email: &str) -> User {
    user(db, email, Role::Teacher)
}

pub fn student(db: &mut JSONDatabase, email: &str) -> User {
    user(db, email, Role::Student)
}

pub fn course(db: &mut JSONDatabase, title: &str, owner: &User) -> CourseId {
    db.course_add(NewCourse {
        title: title.to_string(),
        description: Some(format!("All about {}", title)),
        teacher: owner.id,
        thumbnail: None,
        materials: Vec::new(),
    })
    .unwrap()
}

pub fn fetch(db: &JSONDatabase, id: CourseId) -> Course {
    db.course_get(id).unwrap().clone()
}
