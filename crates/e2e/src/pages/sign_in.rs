use crate::error::E2eResult;
use crate::page_cache::{memoize_open, Page};
use crate::session::{Driver, Locator};

use super::{BlogPage, ProfilePage};

/// Login form
#[derive(Clone)]
pub struct SignInPage {
    driver: Driver,
}

impl Page for SignInPage {
    const NAME: &'static str = "SignInPage";
    type Args = ();

    fn from_driver(driver: Driver, _args: ()) -> Self {
        Self { driver }
    }

    fn driver(&self) -> &Driver {
        &self.driver
    }
}

impl SignInPage {
    pub async fn open(driver: &Driver) -> E2eResult<Self> {
        memoize_open(driver, (), |driver, args| async move {
            let blog = BlogPage::open(&driver).await?;
            blog.click_sign_in().await?;
            Ok(Self::from_driver(driver, args))
        })
        .await
    }

    pub fn username() -> Locator {
        Locator::id("id_username")
    }

    pub fn password() -> Locator {
        Locator::id("id_password")
    }

    pub fn login_button() -> Locator {
        Locator::button("Login")
    }

    /// Submit the form; the blog lands on the profile page
    pub async fn sign_in(&self, username: &str, password: &str) -> E2eResult<ProfilePage> {
        self.driver.fill(&Self::username(), username).await?;
        self.driver.fill(&Self::password(), password).await?;
        self.driver.click(&Self::login_button()).await?;
        Ok(ProfilePage::from_driver(self.driver.clone(), ()))
    }
}
