use crate::error::{E2eError, E2eResult};
use crate::page_cache::{memoize_open, Page};
use crate::session::{Driver, Locator};

use super::{BlogPage, InputField};

/// Signed-in user's profile form
#[derive(Clone)]
pub struct ProfilePage {
    driver: Driver,
}

impl Page for ProfilePage {
    const NAME: &'static str = "ProfilePage";
    type Args = ();

    fn from_driver(driver: Driver, _args: ()) -> Self {
        Self { driver }
    }

    fn driver(&self) -> &Driver {
        &self.driver
    }
}

impl ProfilePage {
    /// Open through the navigation bar. Fails with [`E2eError::NotSignedIn`]
    /// when no user is signed in.
    pub async fn open(driver: &Driver) -> E2eResult<Self> {
        memoize_open(driver, (), |driver, args| async move {
            let blog = BlogPage::open(&driver).await?;
            if !blog.is_signed_in().await? {
                return Err(E2eError::NotSignedIn);
            }
            driver.click(&BlogPage::profile_button()).await?;
            Ok(Self::from_driver(driver, args))
        })
        .await
    }

    pub fn first_name_input(&self) -> InputField {
        InputField::new(&self.driver, "First Name")
    }

    pub fn last_name_input(&self) -> InputField {
        InputField::new(&self.driver, "Last Name")
    }

    pub fn username_input(&self) -> InputField {
        InputField::new(&self.driver, "Username")
    }

    pub fn email_input(&self) -> InputField {
        InputField::new(&self.driver, "Email")
    }

    pub fn save_button() -> Locator {
        Locator::button("Update")
    }

    pub async fn save(&self) -> E2eResult<()> {
        self.driver.click(&Self::save_button()).await
    }
}
