use blogsuite_common::models::Post;

use crate::error::E2eResult;
use crate::page_cache::{memoize_open, Page};
use crate::session::{Driver, Locator};

use super::{BlogPage, FormField, InputField, PostDetailsPage, TextAreaField};

/// New post form
#[derive(Clone)]
pub struct PostCreatePage {
    driver: Driver,
}

impl Page for PostCreatePage {
    const NAME: &'static str = "PostCreatePage";
    type Args = ();

    fn from_driver(driver: Driver, _args: ()) -> Self {
        Self { driver }
    }

    fn driver(&self) -> &Driver {
        &self.driver
    }
}

impl PostCreatePage {
    pub async fn open(driver: &Driver) -> E2eResult<Self> {
        memoize_open(driver, (), |driver, args| async move {
            let blog = BlogPage::open(&driver).await?;
            blog.click_create_post().await?;
            Ok(Self::from_driver(driver, args))
        })
        .await
    }

    pub fn title(&self) -> InputField {
        InputField::new(&self.driver, "Title")
    }

    pub fn description(&self) -> TextAreaField {
        TextAreaField::new(&self.driver, "Description")
    }

    pub fn content(&self) -> TextAreaField {
        TextAreaField::new(&self.driver, "Content")
    }

    pub fn publish_button() -> Locator {
        Locator::button("Post")
    }

    pub async fn is_loaded(&self) -> E2eResult<bool> {
        self.title().is_displayed().await
    }

    /// Fill the form and publish; returns the new post's page
    pub async fn create(&self, post: &Post) -> E2eResult<PostDetailsPage> {
        self.title().fill(post.title()).await?;
        self.description().fill(post.description()).await?;
        self.content().fill(post.content()).await?;
        let publish = Self::publish_button();
        self.driver
            .wait_for_url_change(|| self.driver.click(&publish))
            .await?;
        Ok(PostDetailsPage::from_driver(self.driver.clone(), post.clone()))
    }
}
