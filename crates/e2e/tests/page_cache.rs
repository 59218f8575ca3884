//! Page-open cache behavior against an in-memory browser

mod support;

use std::sync::Arc;

use blogsuite_common::models::Post;
use blogsuite_e2e::pages::{BlogPage, PostCreatePage, PostDetailsPage, ProfilePage, SignInPage};
use blogsuite_e2e::{memoize_open, BrowserSession, E2eError, Locator, Page, PageCacheKey, UrlCache};

use support::{driver, FakeSession, APP_ROOT};

#[tokio::test]
async fn test_first_open_navigates_then_jumps_to_cached_address() {
    let urls = Arc::new(UrlCache::new());
    let session = FakeSession::blog("session-1");
    let driver = driver(&session, &urls);

    SignInPage::open(&driver).await.unwrap();
    assert_eq!(session.url(), "http://blog.test/login/");
    assert_eq!(session.clicks(), 1);
    assert_eq!(urls.len(), 1);

    session.navigate_to("http://blog.test/about/").await.unwrap();

    SignInPage::open(&driver).await.unwrap();
    assert_eq!(session.url(), "http://blog.test/login/");
    assert_eq!(session.clicks(), 1);
    assert_eq!(
        session.navigations(),
        vec![APP_ROOT, "http://blog.test/about/", "http://blog.test/login/"]
    );
}

#[tokio::test]
async fn test_cached_address_is_not_reused_by_another_session() {
    let urls = Arc::new(UrlCache::new());
    let first = FakeSession::blog("session-1");
    let second = FakeSession::blog("session-2");

    SignInPage::open(&driver(&first, &urls)).await.unwrap();
    SignInPage::open(&driver(&second, &urls)).await.unwrap();

    assert_eq!(first.clicks(), 1);
    assert_eq!(second.clicks(), 1);
    assert_eq!(urls.len(), 2);
}

#[tokio::test]
async fn test_page_types_are_cached_separately() {
    let urls = Arc::new(UrlCache::new());
    let session = FakeSession::blog("session-1");
    let driver = driver(&session, &urls);

    SignInPage::open(&driver).await.unwrap();
    PostCreatePage::open(&driver).await.unwrap();
    assert_eq!(session.url(), "http://blog.test/post/new/");
    assert_eq!(session.clicks(), 2);

    let sign_in = PageCacheKey::new(SignInPage::NAME, "session-1", &());
    assert_eq!(urls.get(&sign_in).as_deref(), Some("http://blog.test/login/"));
}

#[tokio::test]
async fn test_arguments_are_part_of_the_key() {
    let urls = Arc::new(UrlCache::new());
    let session = FakeSession::blog("session-1");
    let driver = driver(&session, &urls);

    let first = Post::new("First", "d", "c");
    let second = Post::new("Second", "d", "c");
    session.link(&Locator::exact_link("First"), "http://blog.test/post/first/");
    session.link(&Locator::exact_link("Second"), "http://blog.test/post/second/");

    let page = PostDetailsPage::open(&driver, first.clone()).await.unwrap();
    assert_eq!(page.post(), &first);
    PostDetailsPage::open(&driver, second).await.unwrap();
    assert_eq!(session.clicks(), 2);

    let page = PostDetailsPage::open(&driver, first.clone()).await.unwrap();
    assert_eq!(session.clicks(), 2);
    assert_eq!(session.url(), "http://blog.test/post/first/");
    assert_eq!(page.post(), &first);
}

#[tokio::test]
async fn test_failed_open_stores_nothing() {
    let urls = Arc::new(UrlCache::new());
    let session = FakeSession::blog("session-1");
    let driver = driver(&session, &urls);

    let err = ProfilePage::open(&driver).await.err().unwrap();
    assert!(matches!(err, E2eError::NotSignedIn));
    assert!(urls.is_empty());

    session.link(&BlogPage::profile_button(), "http://blog.test/profile/");
    ProfilePage::open(&driver).await.unwrap();
    assert_eq!(session.url(), "http://blog.test/profile/");
    assert_eq!(urls.len(), 1);
}

#[tokio::test]
async fn test_memoize_open_with_custom_navigation() {
    let urls = Arc::new(UrlCache::new());
    let session = FakeSession::new("session-1");
    let driver = driver(&session, &urls);
    let mut opened = 0;

    for _ in 0..3 {
        let page: BlogPage = memoize_open(&driver, (), |driver, args| {
            opened += 1;
            async move {
                driver.session().navigate_to("http://blog.test/archive/").await?;
                Ok(BlogPage::from_driver(driver, args))
            }
        })
        .await
        .unwrap();
        assert_eq!(page.current_url().await.unwrap(), "http://blog.test/archive/");
    }

    assert_eq!(opened, 1);
    assert_eq!(session.navigations().len(), 3);
}
