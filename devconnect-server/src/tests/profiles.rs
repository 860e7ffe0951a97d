use axum::http::StatusCode;
use devconnect_api::{Error as ApiError, Profile, UserId};
use serde_json::{json, Value};

use super::{send, validation_error, TestApp};

fn profile(body: Value) -> Profile {
    serde_json::from_value(body).expect("parsing profile")
}

fn fields(handle: &str) -> Value {
    json!({
        "handle": handle,
        "status": "Developer",
        "skills": "rust, postgres",
        "website": "https://example.com",
        "linkedin": "linkedin.com/in/someone",
    })
}

impl TestApp {
    async fn save_profile(&self, user: UserId, body: Value) -> Profile {
        profile(self.expect_ok("POST", "/api/profile", Some(user), Some(body)).await)
    }
}

#[tokio::test]
async fn test_route() {
    let t = TestApp::new();
    assert_eq!(
        t.expect_ok("GET", "/api/profile/test", None, None).await,
        json!({ "msg": "Profile Works" })
    );
}

#[tokio::test]
async fn create_read_and_update() {
    let t = TestApp::new();
    let alice = UserId::random();

    let (status, err) = t.expect_err("GET", "/api/profile", Some(alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err, ApiError::NoProfile);
    let (_, err) = t.expect_err("GET", "/api/profile/all", None, None).await;
    assert_eq!(err, ApiError::NoProfiles);

    let (status, err) = t
        .expect_err("POST", "/api/profile", Some(alice), Some(json!({ "handle": "a" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let ApiError::Validation(errors) = err else {
        panic!("expected validation errors");
    };
    assert_eq!(
        errors.get("handle"),
        Some("Handle needs to between 2 and 40 characters")
    );
    assert_eq!(errors.get("status"), Some("Status field is required"));
    assert_eq!(errors.get("skills"), Some("Skills field is required"));
    assert_eq!(t.store.test_num_profiles().await, 0);

    let created = t.save_profile(alice, fields("alice")).await;
    assert_eq!(created.user, alice);
    assert_eq!(created.skills, vec!["rust", "postgres"]);
    assert_eq!(created.social.linkedin.as_deref(), Some("linkedin.com/in/someone"));

    let current = profile(t.expect_ok("GET", "/api/profile", Some(alice), None).await);
    assert_eq!(current, created);
    let by_handle = profile(t.expect_ok("GET", "/api/profile/handle/alice", None, None).await);
    assert_eq!(by_handle, created);
    let by_user = profile(
        t.expect_ok("GET", &format!("/api/profile/user/{alice}"), None, None)
            .await,
    );
    assert_eq!(by_user, created);
    let all: Vec<Profile> =
        serde_json::from_value(t.expect_ok("GET", "/api/profile/all", None, None).await).unwrap();
    assert_eq!(all, vec![created.clone()]);

    for uri in [
        String::from("/api/profile/handle/bob"),
        format!("/api/profile/user/{}", UserId::random()),
        String::from("/api/profile/user/not-a-uuid"),
    ] {
        let (status, err) = t.expect_err("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(err, ApiError::NoProfile);
    }

    // absent optional fields are kept, the rest is overwritten
    let updated = t
        .save_profile(
            alice,
            json!({ "handle": "alice_b", "status": "Lead", "skills": ["go"] }),
        )
        .await;
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.date, created.date);
    assert_eq!(updated.handle, "alice_b");
    assert_eq!(updated.skills, vec!["go"]);
    assert_eq!(updated.website, created.website);
    assert_eq!(t.store.test_num_profiles().await, 1);
    let (_, err) = t
        .expect_err("GET", "/api/profile/handle/alice", None, None)
        .await;
    assert_eq!(err, ApiError::NoProfile);

    // the collection route answers with a trailing slash too
    let current = profile(t.expect_ok("GET", "/api/profile/", Some(alice), None).await);
    assert_eq!(current, updated);
}

#[tokio::test]
async fn handles_are_unique() {
    let t = TestApp::new();
    let (alice, bob) = (UserId::random(), UserId::random());
    t.save_profile(alice, fields("alice")).await;

    let (status, err) = t
        .expect_err("POST", "/api/profile", Some(bob), Some(fields("alice")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err, ApiError::handle_taken());
    assert_eq!(t.store.test_num_profiles().await, 1);

    t.save_profile(bob, fields("bob")).await;
    let (_, err) = t
        .expect_err("POST", "/api/profile", Some(bob), Some(fields("alice")))
        .await;
    assert_eq!(err, ApiError::handle_taken());
    let bob_profile = profile(t.expect_ok("GET", "/api/profile", Some(bob), None).await);
    assert_eq!(bob_profile.handle, "bob");

    // saving again under one's own handle is fine
    t.save_profile(alice, fields("alice")).await;
}

#[tokio::test]
async fn concurrent_handle_claims_leave_one_owner() {
    let t = TestApp::new();
    let tasks = (0..8)
        .map(|_| {
            let app = t.app.clone();
            let req = t.request(
                "POST",
                "/api/profile",
                Some(UserId::random()),
                Some(fields("popular")),
            );
            tokio::spawn(async move { send(app, req).await.0 })
        })
        .collect::<Vec<_>>();
    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => ok += 1,
            status => assert_eq!(status, StatusCode::BAD_REQUEST),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(t.store.test_num_profiles().await, 1);
}

#[tokio::test]
async fn experience_entries() {
    let t = TestApp::new();
    let alice = UserId::random();
    let job = json!({ "title": "Engineer", "company": "Initech", "from": "2019-01-01" });

    let (status, err) = t
        .expect_err("POST", "/api/profile/experience", Some(alice), Some(job.clone()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err, ApiError::NoProfile);

    t.save_profile(alice, fields("alice")).await;
    let (status, err) = t
        .expect_err(
            "POST",
            "/api/profile/experience",
            Some(alice),
            Some(json!({ "company": "Initech", "from": "sometime" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        validation_error(err.clone(), "title").as_deref(),
        Some("Job title field is required")
    );
    assert_eq!(
        validation_error(err, "from").as_deref(),
        Some("From date is invalid")
    );

    let first = profile(
        t.expect_ok("POST", "/api/profile/experience", Some(alice), Some(job))
            .await,
    );
    let second = profile(
        t.expect_ok(
            "POST",
            "/api/profile/experience",
            Some(alice),
            Some(json!({
                "title": "Lead",
                "company": "Initrode",
                "from": "2021-06-01T09:00:00Z",
                "current": true,
            })),
        )
        .await,
    );
    assert_eq!(second.experience.len(), 2);
    assert_eq!(second.experience[0].title, "Lead");
    assert_eq!(second.experience[1], first.experience[0]);

    // unknown ids leave the profile as is
    for id in [UserId::random().to_string(), String::from("garbage")] {
        let unchanged = profile(
            t.expect_ok(
                "DELETE",
                &format!("/api/profile/experience/{id}"),
                Some(alice),
                None,
            )
            .await,
        );
        assert_eq!(unchanged, second);
    }

    let removed = profile(
        t.expect_ok(
            "DELETE",
            &format!("/api/profile/experience/{}", first.experience[0].id),
            Some(alice),
            None,
        )
        .await,
    );
    assert_eq!(removed.experience, vec![second.experience[0].clone()]);
}

#[tokio::test]
async fn education_entries() {
    let t = TestApp::new();
    let alice = UserId::random();
    t.save_profile(alice, fields("alice")).await;
    let school = json!({
        "school": "MIT",
        "degree": "BSc",
        "fieldofstudy": "Computer Science",
        "from": "2010-09-01",
        "to": "2014-06-30",
    });

    let (_, err) = t
        .expect_err("POST", "/api/profile/education", Some(alice), None)
        .await;
    assert_eq!(
        validation_error(err, "fieldofstudy").as_deref(),
        Some("Field of study field is required")
    );

    let p = profile(
        t.expect_ok("POST", "/api/profile/education", Some(alice), Some(school))
            .await,
    );
    assert_eq!(p.education.len(), 1);
    assert!(!p.education[0].current);

    let p = profile(
        t.expect_ok(
            "DELETE",
            &format!("/api/profile/education/{}", p.education[0].id),
            Some(alice),
            None,
        )
        .await,
    );
    assert!(p.education.is_empty());
}

#[tokio::test]
async fn delete_profile() {
    let t = TestApp::new();
    let (alice, bob) = (UserId::random(), UserId::random());
    t.save_profile(alice, fields("alice")).await;
    let bob_profile = t.save_profile(bob, fields("bob")).await;
    t.expect_ok(
        "POST",
        "/api/posts",
        Some(alice),
        Some(json!({ "text": "a post that outlives the profile" })),
    )
    .await;

    for _ in 0..2 {
        assert_eq!(
            t.expect_ok("DELETE", "/api/profile", Some(alice), None).await,
            json!({ "success": true })
        );
    }
    let (_, err) = t.expect_err("GET", "/api/profile", Some(alice), None).await;
    assert_eq!(err, ApiError::NoProfile);
    assert_eq!(t.store.test_num_posts().await, 1);
    let all: Vec<Profile> =
        serde_json::from_value(t.expect_ok("GET", "/api/profile/all", None, None).await).unwrap();
    assert_eq!(all, vec![bob_profile]);
}

#[tokio::test]
async fn writes_require_authentication() {
    let t = TestApp::new();
    for (method, uri) in [
        ("GET", "/api/profile"),
        ("POST", "/api/profile"),
        ("DELETE", "/api/profile"),
        ("POST", "/api/profile/experience"),
        ("POST", "/api/profile/education"),
        ("DELETE", "/api/profile/experience/x"),
        ("DELETE", "/api/profile/education/x"),
    ] {
        let (status, err) = t
            .expect_err(method, uri, None, Some(fields("alice")))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(err, ApiError::Unauthorized);
    }
    assert_eq!(t.store.test_num_profiles().await, 0);
}

#[tokio::test]
async fn store_outage_is_internal_error() {
    let t = TestApp::new();
    t.store.set_unavailable(true);
    let (status, err) = t.expect_err("GET", "/api/profile/all", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(err, ApiError::Unknown(_)));
}
