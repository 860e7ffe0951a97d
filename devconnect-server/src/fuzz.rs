#![cfg(test)]

use axum::{
    extract::FromRequestParts,
    http::{self, request},
    Router,
};
use devconnect_api::{
    Claims, Error as ApiError, Post, PostId, Profile, TokenKeys, UserId, DEFAULT_TOKEN_TTL,
};
use devconnect_mock_store::MockStore;
use std::{
    cmp, collections::HashSet, ops::RangeTo, panic::AssertUnwindSafe, path::Path, sync::Arc,
};
use tower::{Service, ServiceExt};

use crate::{extractors::*, *};

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

fn build_pg_cluster(data: &Path) -> postgresfixture::cluster::Cluster {
    let mut runtime = None;
    let mut best_version = None;
    for r in postgresfixture::runtime::Runtime::find_on_path() {
        if let Ok(v) = r.version() {
            match (&mut runtime, &mut best_version) {
                (None, None) => {
                    runtime = Some(r);
                    best_version = Some(v);
                }
                (Some(runtime), Some(best_version)) => {
                    if *best_version < v {
                        *runtime = r;
                        *best_version = v;
                    }
                }
                _ => unreachable!(),
            }
        }
    }
    postgresfixture::cluster::Cluster::new(
        data,
        runtime.expect("postgresql seems to not be installed in path"),
    )
}

macro_rules! do_sqlx_test {
    ( $name:ident, $gen:expr, $fn:expr ) => {
        #[test]
        #[ignore = "needs postgresql binaries in PATH"]
        fn $name() {
            if std::env::var("RUST_LOG").is_ok() {
                tracing_subscriber::fmt::init();
            }
            let lockfile = tempfile::tempfile().expect("creating tempfile");
            let datadir = tempfile::tempdir().expect("creating tempdir");
            let datadir_path: &Path = datadir.as_ref();
            let cluster = build_pg_cluster(datadir_path);
            let datadir_path: &str = datadir_path.to_str().expect("tempdir is not valid utf8");
            postgresfixture::coordinate::run_and_destroy(&cluster, lockfile.into(), || {
                cluster.createdb("test_db").expect("creating test_db database");
                let runtime = AssertUnwindSafe(
                    tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .expect("failed initializing tokio runtime"),
                );
                let pool = AssertUnwindSafe(runtime.block_on(async move {
                    let pool = create_sqlx_pool(
                        &format!("postgresql://?host={}&dbname=test_db", datadir_path),
                        4,
                    )
                    .await
                    .expect("creating sqlx pool");
                    MIGRATOR
                        .run(&pool)
                        .await
                        .expect("failed applying migrations");
                    pool
                }));
                bolero::check!()
                    .with_generator($gen)
                    .cloned()
                    .for_each(move |v| {
                        let pool = pool.clone();
                        let idle_before = pool.num_idle();
                        let v_str = format!("{v:?}");
                        let idle_after_res: Result<usize, _> = {
                            let pool = pool.clone();
                            std::panic::catch_unwind(AssertUnwindSafe(|| {
                                runtime.block_on(async move {
                                    let () = $fn(pool.clone(), v).await;
                                    let mut idle_after = pool.num_idle();
                                    let wait_release_since = std::time::Instant::now();
                                    while idle_after < idle_before
                                        && wait_release_since.elapsed()
                                            <= std::time::Duration::from_secs(1)
                                    {
                                        tokio::task::yield_now().await;
                                        idle_after = pool.num_idle();
                                    }
                                    idle_after
                                })
                            }))
                        };
                        runtime.block_on(async move {
                            // cleanup
                            sqlx::query(include_str!("../reset-test-db.sql"))
                                .execute(&pool)
                                .await
                                .expect("failed cleaning up database");
                        });
                        match idle_after_res {
                            Err(e) => std::panic::resume_unwind(e),
                            Ok(idle_after) => assert!(
                                idle_after >= idle_before,
                                "test {} kept pool connections: {idle_before} idle before, {idle_after} after, with value {v_str}",
                                stringify!($name)
                            ),
                        }
                    });
            })
            .expect("coordinating spinup and shutdown of the pg cluster");
        }
    };
}

do_tokio_test!(fuzz_preauth_extractor, String, |token| async move {
    if let Ok(req) = http::Request::builder()
        .method(http::Method::GET)
        .uri("/")
        .header(http::header::AUTHORIZATION, token)
        .body(())
    {
        let mut req = req.into_parts().0;
        let res = PreAuth::from_request_parts(&mut req, &()).await;
        match res {
            Ok(PreAuth(token)) => assert!(!token.is_empty() && !token.contains(' ')),
            Err(Error::Api(ApiError::Unauthorized)) => (),
            Err(e) => panic!("got unexpected error: {e}"),
        }
    }
});

const NUM_USERS: usize = 3;

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    Create { user: usize, text_len: u16 },
    List,
    Get { post: usize },
    Delete { user: usize, post: usize },
    Like { user: usize, post: usize },
    Unlike { user: usize, post: usize },
    Comment { user: usize, post: usize, text_len: u16 },
    Uncomment { user: usize, post: usize, comment: usize },
    SaveProfile { user: usize, handle: u8 },
    ListProfiles,
    DeleteProfile { user: usize },
    AddExperience { user: usize, title_len: u8 },
    RemoveExperience { user: usize, entry: usize },
}

/// A post with every store-assigned field stripped, so that two stores can be compared
#[derive(Debug, Eq, PartialEq)]
struct PostShape {
    user: UserId,
    text: String,
    likes: Vec<UserId>,
    comments: Vec<(UserId, String)>,
}

impl From<Post> for PostShape {
    fn from(p: Post) -> PostShape {
        PostShape {
            user: p.user,
            text: p.text,
            likes: p.likes.into_iter().map(|l| l.user).collect(),
            comments: p.comments.into_iter().map(|c| (c.user, c.text)).collect(),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
struct ProfileShape {
    user: UserId,
    handle: String,
    experience: Vec<String>,
}

impl From<Profile> for ProfileShape {
    fn from(p: Profile) -> ProfileShape {
        ProfileShape {
            user: p.user,
            handle: p.handle,
            experience: p.experience.into_iter().map(|e| e.title).collect(),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
enum Shape {
    Post(PostShape),
    Posts(Vec<PostShape>),
    Profile(ProfileShape),
    Profiles(Vec<ProfileShape>),
    Deleted,
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

fn text(len: u16) -> String {
    // straddles both validation bounds
    "y".repeat(usize::from(len) % 320)
}

/// Few distinct handles so that they collide, and one that is too short
fn handle(h: u8) -> String {
    match h % 5 {
        4 => String::from("x"),
        n => format!("h{n}"),
    }
}

async fn call(
    app: &mut Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Result<serde_json::Value, ApiError> {
    let req = request::Builder::new().method(method).uri(uri);
    let req = match token {
        Some(token) => req.header(http::header::AUTHORIZATION, format!("bearer {token}")),
        None => req,
    };
    let body = match &body {
        Some(body) => axum::body::Body::from(
            serde_json::to_vec(body).expect("serializing request body to json"),
        ),
        None => axum::body::Body::empty(),
    };
    let req = req.body(body).expect("building request");
    app.ready().await.expect("waiting for app to be ready");
    let resp = app.call(req).await.expect("running request");
    let status = resp.status();
    let bytes = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    if status == http::StatusCode::OK {
        return Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            panic!("failed parsing resp body {bytes:?} for {method} {uri}: {err}")
        }));
    }
    let err = ApiError::parse(&bytes)
        .unwrap_or_else(|err| panic!("parsing error response body {err}, body is {bytes:?}"));
    assert_eq!(status, err.status_code(), "status does not match {err:?}");
    Err(err)
}

struct Fuzzer {
    app: Router,
    users: Vec<(UserId, String)>,
}

impl Fuzzer {
    fn new(store: Store, profiles: Profiles, users: &[UserId]) -> Fuzzer {
        let keys = TokenKeys::from_secret(b"fuzzing secret");
        let users = users
            .iter()
            .map(|&u| {
                let token = keys
                    .issue(&Claims::new(u, DEFAULT_TOKEN_TTL))
                    .expect("issuing fuzz token");
                (u, token)
            })
            .collect();
        Fuzzer {
            app: app(store, profiles, keys),
            users,
        }
    }

    async fn posts(&mut self) -> Vec<Post> {
        let posts = call(&mut self.app, "GET", "/api/posts", None, None)
            .await
            .expect("listing posts");
        serde_json::from_value(posts).expect("parsing post list")
    }

    async fn profiles(&mut self) -> Vec<Profile> {
        match call(&mut self.app, "GET", "/api/profile/all", None, None).await {
            Ok(profiles) => serde_json::from_value(profiles).expect("parsing profile list"),
            Err(ApiError::NoProfiles) => Vec::new(),
            Err(e) => panic!("listing profiles failed with {e:?}"),
        }
    }

    /// Pick an existing post, or a missing one when there is none
    async fn pick(&mut self, post: usize) -> (PostId, Option<Post>) {
        let mut posts = self.posts().await;
        match resize_int(post, ..posts.len()) {
            Some(idx) => {
                let p = posts.swap_remove(idx);
                (p.id, Some(p))
            }
            None => (PostId::random(), None),
        }
    }

    fn user(&self, user: usize) -> (UserId, String) {
        self.users[user % self.users.len()].clone()
    }

    fn token(&self, user: usize) -> String {
        self.user(user).1
    }

    /// Checks that a returned post is exactly what a later read sees
    async fn post_result(
        &mut self,
        res: Result<serde_json::Value, ApiError>,
    ) -> Result<Shape, ApiError> {
        let post = serde_json::from_value::<Post>(res?).expect("parsing post");
        let stored = call(
            &mut self.app,
            "GET",
            &format!("/api/posts/{}", post.id),
            None,
            None,
        )
        .await
        .expect("reading back post");
        assert_eq!(
            serde_json::from_value::<Post>(stored).expect("parsing stored post"),
            post,
            "response differs from stored post"
        );
        Ok(Shape::Post(post.into()))
    }

    async fn profile_result(
        &mut self,
        res: Result<serde_json::Value, ApiError>,
    ) -> Result<Shape, ApiError> {
        let profile = serde_json::from_value::<Profile>(res?).expect("parsing profile");
        let stored = call(
            &mut self.app,
            "GET",
            &format!("/api/profile/user/{}", profile.user),
            None,
            None,
        )
        .await
        .expect("reading back profile");
        assert_eq!(
            serde_json::from_value::<Profile>(stored).expect("parsing stored profile"),
            profile,
            "response differs from stored profile"
        );
        Ok(Shape::Profile(profile.into()))
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) -> Result<Shape, ApiError> {
        match op {
            FuzzOp::Create { user, text_len } => {
                let tok = self.token(user);
                let body = serde_json::json!({ "text": text(text_len) });
                let res = call(&mut self.app, "POST", "/api/posts", Some(&tok), Some(body)).await;
                self.post_result(res).await
            }
            FuzzOp::List => Ok(Shape::Posts(
                self.posts().await.into_iter().map(PostShape::from).collect(),
            )),
            FuzzOp::Get { post } => {
                let (id, _) = self.pick(post).await;
                let res = call(&mut self.app, "GET", &format!("/api/posts/{id}"), None, None).await;
                self.post_result(res).await
            }
            FuzzOp::Delete { user, post } => {
                let (id, _) = self.pick(post).await;
                let tok = self.token(user);
                let uri = format!("/api/posts/{id}");
                call(&mut self.app, "DELETE", &uri, Some(&tok), None)
                    .await
                    .map(|v| {
                        assert_eq!(v, serde_json::json!({ "success": true }));
                        Shape::Deleted
                    })
            }
            FuzzOp::Like { user, post } | FuzzOp::Unlike { user, post } => {
                let route = match op {
                    FuzzOp::Like { .. } => "like",
                    _ => "dislike",
                };
                let (id, _) = self.pick(post).await;
                let tok = self.token(user);
                let uri = format!("/api/posts/{route}/{id}");
                let res = call(&mut self.app, "POST", &uri, Some(&tok), None).await;
                self.post_result(res).await
            }
            FuzzOp::Comment {
                user,
                post,
                text_len,
            } => {
                let (id, _) = self.pick(post).await;
                let tok = self.token(user);
                let uri = format!("/api/posts/comment/{id}");
                let body = serde_json::json!({ "text": text(text_len) });
                let res = call(&mut self.app, "POST", &uri, Some(&tok), Some(body)).await;
                self.post_result(res).await
            }
            FuzzOp::Uncomment {
                user,
                post,
                comment,
            } => {
                let (id, p) = self.pick(post).await;
                let comments = p.map(|p| p.comments).unwrap_or_default();
                let comment = match resize_int(comment, ..comments.len()) {
                    Some(idx) => comments[idx].id.to_string(),
                    None => PostId::random().to_string(),
                };
                let tok = self.token(user);
                let uri = format!("/api/posts/comment/{id}/{comment}");
                let res = call(&mut self.app, "DELETE", &uri, Some(&tok), None).await;
                self.post_result(res).await
            }
            FuzzOp::SaveProfile { user, handle: h } => {
                let tok = self.token(user);
                let body = serde_json::json!({
                    "handle": handle(h),
                    "status": "Developer",
                    "skills": "rust",
                });
                let res = call(&mut self.app, "POST", "/api/profile", Some(&tok), Some(body)).await;
                self.profile_result(res).await
            }
            FuzzOp::ListProfiles => Ok(Shape::Profiles(
                self.profiles()
                    .await
                    .into_iter()
                    .map(ProfileShape::from)
                    .collect(),
            )),
            FuzzOp::DeleteProfile { user } => {
                let tok = self.token(user);
                call(&mut self.app, "DELETE", "/api/profile", Some(&tok), None)
                    .await
                    .map(|v| {
                        assert_eq!(v, serde_json::json!({ "success": true }));
                        Shape::Deleted
                    })
            }
            FuzzOp::AddExperience { user, title_len } => {
                let tok = self.token(user);
                let body = serde_json::json!({
                    "title": "t".repeat(usize::from(title_len % 3)),
                    "company": "Initech",
                    "from": "2020-01-01",
                });
                let uri = "/api/profile/experience";
                let res = call(&mut self.app, "POST", uri, Some(&tok), Some(body)).await;
                self.profile_result(res).await
            }
            FuzzOp::RemoveExperience { user, entry } => {
                let (user_id, tok) = self.user(user);
                let experience = self
                    .profiles()
                    .await
                    .into_iter()
                    .find(|p| p.user == user_id)
                    .map(|p| p.experience)
                    .unwrap_or_default();
                let entry = match resize_int(entry, ..experience.len()) {
                    Some(idx) => experience[idx].id.to_string(),
                    None => PostId::random().to_string(),
                };
                let uri = format!("/api/profile/experience/{entry}");
                let res = call(&mut self.app, "DELETE", &uri, Some(&tok), None).await;
                self.profile_result(res).await
            }
        }
    }

    async fn check_invariants(&mut self) {
        for p in self.posts().await {
            let likers = p.likes.iter().map(|l| l.user).collect::<HashSet<_>>();
            assert_eq!(likers.len(), p.likes.len(), "duplicate like in {p:?}");
            assert!(
                p.comments.windows(2).all(|w| w[0].date >= w[1].date),
                "comments out of order in {p:?}"
            );
            assert!(
                (10..=300).contains(&p.text.chars().count()),
                "invalid text got stored in {p:?}"
            );
        }
        let profiles = self.profiles().await;
        let owners = profiles.iter().map(|p| p.user).collect::<HashSet<_>>();
        assert_eq!(owners.len(), profiles.len(), "user with two profiles");
        let handles = profiles.iter().map(|p| &p.handle).collect::<HashSet<_>>();
        assert_eq!(handles.len(), profiles.len(), "handle used twice");
        for p in &profiles {
            assert!(
                p.experience.iter().all(|e| !e.title.is_empty()),
                "invalid experience got stored in {p:?}"
            );
        }
    }
}

fn fuzz_users() -> Vec<UserId> {
    (0..NUM_USERS).map(|_| UserId::random()).collect()
}

do_tokio_test!(fuzz_invariants_hold, Vec<FuzzOp>, |ops: Vec<FuzzOp>| async move {
    let store = Arc::new(MockStore::new());
    let mut fuzzer = Fuzzer::new(store.clone(), store, &fuzz_users());
    for op in ops {
        let _ = fuzzer.execute_fuzz_op(op).await;
        fuzzer.check_invariants().await;
    }
});

do_sqlx_test!(
    compare_with_mock,
    bolero::generator::gen_with::<Vec<FuzzOp>>().len(1..50usize),
    |pool: sqlx::PgPool, ops: Vec<FuzzOp>| async move {
        let users = fuzz_users();
        let db = Arc::new(PgStore::new(pool));
        let mut app = Fuzzer::new(db.clone(), db, &users);
        let store = Arc::new(MockStore::new());
        let mut mock = Fuzzer::new(store.clone(), store, &users);
        for op in ops {
            let name = format!("{op:?}");
            let app_res = app.execute_fuzz_op(op.clone()).await;
            let mock_res = mock.execute_fuzz_op(op).await;
            assert_eq!(
                app_res, mock_res,
                "app and mock did not return the same result for {name}"
            );
        }
    }
);
