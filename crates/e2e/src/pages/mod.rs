//! Page objects for the blog UI
//!
//! Every page shares the blog navigation bar. Pages reached by clicking
//! through the UI open through [`memoize_open`](crate::page_cache::memoize_open),
//! so the clicks happen once per browser session.

pub mod fields;
pub mod post_create;
pub mod post_details;
pub mod profile;
pub mod sign_in;

pub use fields::{FormField, InputField, TextAreaField};
pub use post_create::PostCreatePage;
pub use post_details::PostDetailsPage;
pub use profile::ProfilePage;
pub use sign_in::SignInPage;

use tracing::debug;

use crate::error::E2eResult;
use crate::page_cache::Page;
use crate::session::{Driver, Locator};

/// Blog navigation bar, present on every page
#[derive(Clone)]
pub struct BlogPage {
    driver: Driver,
}

impl Page for BlogPage {
    const NAME: &'static str = "BlogPage";
    type Args = ();

    fn from_driver(driver: Driver, _args: ()) -> Self {
        Self { driver }
    }

    fn driver(&self) -> &Driver {
        &self.driver
    }
}

impl BlogPage {
    /// Navigate to the application root
    pub async fn open(driver: &Driver) -> E2eResult<Self> {
        debug!("Opening {}", driver.app_root());
        driver.session().navigate_to(driver.app_root()).await?;
        Ok(Self::from_driver(driver.clone(), ()))
    }

    pub fn sign_in_button() -> Locator {
        Locator::link("Login")
    }

    pub fn profile_button() -> Locator {
        Locator::link("Profile")
    }

    pub fn create_post_button() -> Locator {
        Locator::link("Create Post")
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        self.driver.current_url().await
    }

    pub async fn click_sign_in(&self) -> E2eResult<()> {
        self.driver.click(&Self::sign_in_button()).await
    }

    pub async fn click_create_post(&self) -> E2eResult<()> {
        self.driver.click(&Self::create_post_button()).await
    }

    /// Whether the Profile link is shown, i.e. a user is signed in
    pub async fn is_signed_in(&self) -> E2eResult<bool> {
        self.driver.is_displayed(&Self::profile_button()).await
    }
}
