use blogsuite_common::models::Post;

use crate::error::E2eResult;
use crate::page_cache::{memoize_open, Page};
use crate::session::{Driver, Locator};

use super::BlogPage;

/// A published post
#[derive(Clone)]
pub struct PostDetailsPage {
    driver: Driver,
    post: Post,
}

impl Page for PostDetailsPage {
    const NAME: &'static str = "PostDetailsPage";
    type Args = Post;

    fn from_driver(driver: Driver, post: Post) -> Self {
        Self { driver, post }
    }

    fn driver(&self) -> &Driver {
        &self.driver
    }
}

impl PostDetailsPage {
    /// Open by clicking the post's title on the blog front page
    pub async fn open(driver: &Driver, post: Post) -> E2eResult<Self> {
        memoize_open::<Self, _, _>(driver, post, |driver, post: Post| async move {
            BlogPage::open(&driver).await?;
            driver.click(&Locator::exact_link(post.title())).await?;
            Ok(Self::from_driver(driver, post))
        })
        .await
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn title() -> Locator {
        Locator::class("article-title")
    }

    // Description and content share a class; content always comes last
    pub fn description() -> Locator {
        Locator::class("article-content")
    }

    pub fn content() -> Locator {
        Locator::class("article-content").extend("[last()]")
    }

    pub async fn title_text(&self) -> E2eResult<String> {
        self.driver.text(&Self::title()).await
    }

    pub async fn description_text(&self) -> E2eResult<String> {
        self.driver.text(&Self::description()).await
    }

    pub async fn content_text(&self) -> E2eResult<String> {
        self.driver.text(&Self::content()).await
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        self.driver.current_url().await
    }

    pub async fn is_loaded(&self) -> E2eResult<bool> {
        self.driver.is_displayed(&Self::title()).await
    }
}
