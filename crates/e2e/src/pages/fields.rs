//! Form fields located by their visible label

use crate::error::E2eResult;
use crate::session::{Driver, Locator};

/// A form control found by the label text preceding it
#[async_trait::async_trait]
pub trait FormField: Send + Sync {
    fn driver(&self) -> &Driver;

    fn locator(&self) -> &Locator;

    /// Current value of the control
    async fn value(&self) -> E2eResult<String> {
        self.driver().value(self.locator()).await
    }

    /// Replace the control's content with `text`
    async fn fill(&self, text: &str) -> E2eResult<()> {
        self.driver().fill(self.locator(), text).await
    }

    async fn clear(&self) -> E2eResult<()> {
        let locator = self.locator();
        self.driver().wait_until_visible(locator).await?;
        self.driver().session().clear(locator).await
    }

    async fn is_displayed(&self) -> E2eResult<bool> {
        self.driver().is_displayed(self.locator()).await
    }
}

/// `<input>` following a label
#[derive(Clone)]
pub struct InputField {
    driver: Driver,
    locator: Locator,
}

impl InputField {
    pub fn new(driver: &Driver, label: &str) -> Self {
        Self {
            driver: driver.clone(),
            locator: Locator::InputLabel(label.to_string()),
        }
    }
}

impl FormField for InputField {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }
}

/// `<textarea>` following a label
#[derive(Clone)]
pub struct TextAreaField {
    driver: Driver,
    locator: Locator,
}

impl TextAreaField {
    pub fn new(driver: &Driver, label: &str) -> Self {
        Self {
            driver: driver.clone(),
            locator: Locator::TextAreaLabel(label.to_string()),
        }
    }
}

impl FormField for TextAreaField {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn locator(&self) -> &Locator {
        &self.locator
    }
}
