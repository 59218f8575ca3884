//! Blog REST API helpers
//!
//! Thin reqwest client for the endpoints the suite needs to set up and
//! verify data: token login and post CRUD.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use blogsuite_common::models::{AuthTokenRequest, PaginatedPostList, Post, Token};

use crate::error::{E2eError, E2eResult};

/// Default length of generated names
pub const MAX_NAME_LENGTH: usize = 20;

const LOGIN_PATH: &str = "auth/login/";
const POSTS_PATH: &str = "posts/";

/// Authenticated client for the blog API
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

fn http_client() -> E2eResult<Client> {
    Ok(Client::builder().timeout(Duration::from_secs(30)).build()?)
}

fn join(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Fail with the response body unless the status is `expected`
async fn expect_status(response: Response, expected: StatusCode) -> E2eResult<Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(E2eError::NotFound(body));
    }
    Err(E2eError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn json_body<T: DeserializeOwned>(request: RequestBuilder) -> E2eResult<T> {
    let response = expect_status(request.send().await?, StatusCode::OK).await?;
    Ok(response.json().await?)
}

/// Exchange credentials for an auth token
pub async fn login(base_url: &str, credentials: &AuthTokenRequest) -> E2eResult<Token> {
    info!("Logging in to {} as {}", base_url, credentials.email);
    let client = http_client()?;
    json_body(client.post(join(base_url, LOGIN_PATH)).json(credentials)).await
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> E2eResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Token {}", self.token))
    }

    fn post_url(&self, id: i64) -> String {
        join(&self.base_url, &format!("{}{}/", POSTS_PATH, id))
    }

    pub async fn list_posts(&self, search: Option<&str>) -> E2eResult<PaginatedPostList> {
        let mut request = self.client.get(join(&self.base_url, POSTS_PATH));
        if let Some(search) = search {
            request = request.query(&[("search", search)]);
        }
        json_body(self.authorized(request)).await
    }

    pub async fn create_post(&self, post: &Post) -> E2eResult<Post> {
        let request = self.client.post(join(&self.base_url, POSTS_PATH)).json(post);
        let response = expect_status(self.authorized(request).send().await?, StatusCode::CREATED).await?;
        let created: Post = response.json().await?;
        debug!("Created post {:?} ({:?})", created.title, created.id);
        Ok(created)
    }

    /// Delete a post; the API answers 204 on success
    pub async fn delete_post(&self, id: Option<i64>) -> E2eResult<()> {
        let id = id.ok_or_else(|| E2eError::AssertionFailed("post has no id".to_string()))?;
        let request = self.authorized(self.client.delete(self.post_url(id)));
        expect_status(request.send().await?, StatusCode::NO_CONTENT).await?;
        debug!("Deleted post {}", id);
        Ok(())
    }

    /// The single post whose search matches `name`
    pub async fn get_post_by_name(&self, name: &str) -> E2eResult<Post> {
        let page = self.list_posts(Some(name)).await?;
        only_result(page, name)
    }

    pub async fn is_post_exists(&self, name: &str) -> E2eResult<bool> {
        exists(self.get_post_by_name(name)).await
    }
}

fn only_result(mut page: PaginatedPostList, name: &str) -> E2eResult<Post> {
    if page.results.len() != 1 {
        return Err(E2eError::NotFound(format!(
            "expected exactly one post matching {:?}, found {}",
            name,
            page.results.len()
        )));
    }
    Ok(page.results.remove(0))
}

/// Turn a lookup into an existence check: `NotFound` means `false`, any
/// other failure is still an error.
pub async fn exists<T, Fut>(lookup: Fut) -> E2eResult<bool>
where
    Fut: Future<Output = E2eResult<T>>,
{
    match lookup.await {
        Ok(_) => Ok(true),
        Err(E2eError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// `name` followed by a random hex suffix, cut to `max_length` characters
pub fn generate_name_with_uuid(name: &str, max_length: usize) -> String {
    format!("{} {}", name, uuid::Uuid::new_v4().simple())
        .chars()
        .take(max_length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str) -> Post {
        Post {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_generated_names() {
        let a = generate_name_with_uuid("Blog Post", MAX_NAME_LENGTH);
        let b = generate_name_with_uuid("Blog Post", MAX_NAME_LENGTH);
        assert_eq!(a.chars().count(), MAX_NAME_LENGTH);
        assert!(a.starts_with("Blog Post "));
        assert_ne!(a, b);

        assert_eq!(generate_name_with_uuid("Blog Post", 4), "Blog");
        assert_eq!(generate_name_with_uuid("x", 64).len(), 34);
    }

    #[test]
    fn test_only_result_requires_exactly_one() {
        let one = PaginatedPostList {
            count: 1,
            results: vec![post("A")],
            ..Default::default()
        };
        assert_eq!(only_result(one, "A").unwrap().title(), "A");

        let none = PaginatedPostList::default();
        assert!(matches!(only_result(none, "A"), Err(E2eError::NotFound(_))));

        let two = PaginatedPostList {
            count: 2,
            results: vec![post("A"), post("A 2")],
            ..Default::default()
        };
        assert!(matches!(only_result(two, "A"), Err(E2eError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_exists() {
        assert!(exists(async { Ok::<_, E2eError>(1) }).await.unwrap());
        assert!(!exists(async { Err::<(), _>(E2eError::NotFound("x".into())) }).await.unwrap());
        assert!(exists(async { Err::<(), _>(E2eError::Timeout("x".into())) }).await.is_err());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("http://api/", "posts/"), "http://api/posts/");
        assert_eq!(join("http://api", "posts/"), "http://api/posts/");
    }
}
