use serde::Deserialize;

use crate::error::AppError;

pub const MAX_AGE: i32 = 150;

/// Full profile form: PUT /profile.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub bio: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Name is required".into()));
        }
        if let Some(age) = self.age {
            if !(0..=MAX_AGE).contains(&age) {
                return Err(AppError::BadRequest("Age out of range".into()));
            }
        }
        Ok(())
    }
}

/// Partial update from the settings page: PATCH /profile.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUpdate {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_form_requires_name_and_sane_age() {
        let ok = ProfileForm {
            name: "Ada".into(),
            age: Some(36),
            bio: String::new(),
        };
        assert!(ok.validate().is_ok());

        let blank = ProfileForm {
            name: "   ".into(),
            age: None,
            bio: String::new(),
        };
        assert!(blank.validate().is_err());

        let old = ProfileForm {
            name: "Methuselah".into(),
            age: Some(969),
            bio: String::new(),
        };
        assert!(old.validate().is_err());
    }

    #[test]
    fn display_update_defaults_missing_fields() {
        let upd: DisplayUpdate = serde_json::from_str(r#"{"displayName":"Ada"}"#).unwrap();
        assert_eq!(upd.display_name, "Ada");
        assert_eq!(upd.bio, "");
    }
}
