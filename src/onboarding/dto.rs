use serde::Serialize;

use crate::{auth::repo_types::User, profiles::repo_types::Profile, projects::repo_types::Project};

/// What the home screen should show next.
#[derive(Debug, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum HomeView {
    Profile,
    Terms,
    Dashboard {
        username: String,
        last_project: Option<Project>,
    },
}

impl HomeView {
    /// Profile first, then terms, then the dashboard.
    pub fn for_user(user: &User, profile: Option<&Profile>, last_project: Option<Project>) -> Self {
        if !user.profile_completed {
            HomeView::Profile
        } else if !user.terms_accepted {
            HomeView::Terms
        } else {
            HomeView::Dashboard {
                username: Profile::display_name(profile),
                last_project,
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub email: String,
    pub profile_completed: bool,
    pub terms_accepted: bool,
    pub settings_completed: bool,
}

impl From<User> for SettingsView {
    fn from(u: User) -> Self {
        Self {
            email: u.email,
            profile_completed: u.profile_completed,
            terms_accepted: u.terms_accepted,
            settings_completed: u.settings_completed.unwrap_or(false),
        }
    }
}
