//! Screen routing derived from session state

use crate::session::SessionState;
use domus_core::Role;
use std::fmt;

/// Screens the navigation layer can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Shown while the stored session is being read or validated
    SplashOrLoading,
    Welcome,
    Login,
    /// Role and phone still missing
    CompleteProfile,
    HomeForRole(Role),
}

impl Screen {
    /// Route path used by the navigation layer
    pub fn path(&self) -> &'static str {
        match self {
            Screen::SplashOrLoading | Screen::Welcome => "/",
            Screen::Login => "/auth/login",
            Screen::CompleteProfile => "/auth/complete-profile",
            Screen::HomeForRole(Role::Employer) => "/employer",
            Screen::HomeForRole(Role::Cleaner) => "/cleaner",
            Screen::HomeForRole(Role::Unset) => "/auth/complete-profile",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::SplashOrLoading => f.write_str("splash"),
            Screen::Welcome => f.write_str("welcome"),
            Screen::Login => f.write_str("login"),
            Screen::CompleteProfile => f.write_str("complete-profile"),
            Screen::HomeForRole(role) => write!(f, "home({})", role),
        }
    }
}

/// Pick the screen for a session state
///
/// `Login` is never returned; the navigation layer reaches it from `Welcome`.
pub fn route(state: &SessionState) -> Screen {
    match state {
        SessionState::Unknown | SessionState::LoadingStored => Screen::SplashOrLoading,
        SessionState::Unauthenticated => Screen::Welcome,
        SessionState::Authenticated(session) => match session.user.role {
            Role::Unset => Screen::CompleteProfile,
            role => Screen::HomeForRole(role),
        },
    }
}
