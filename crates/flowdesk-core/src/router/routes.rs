use std::fmt;

/// Views of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Analytics,
    Templates,
    Tasks,
    Users,
    Logs,
}

impl Route {
    pub const ALL: [Route; 7] = [
        Route::Login,
        Route::Dashboard,
        Route::Analytics,
        Route::Templates,
        Route::Tasks,
        Route::Users,
        Route::Logs,
    ];

    /// Where the application root sends you
    pub const HOME: Route = Route::Dashboard;

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Analytics => "/analytics",
            Route::Templates => "/templates",
            Route::Tasks => "/tasks",
            Route::Users => "/users",
            Route::Logs => "/logs",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Route::Login => "login",
            Route::Dashboard => "dashboard",
            Route::Analytics => "analytics",
            Route::Templates => "templates",
            Route::Tasks => "tasks",
            Route::Users => "users",
            Route::Logs => "logs",
        }
    }

    pub fn is_login(self) -> bool {
        self == Route::Login
    }

    /// Match an already normalized path exactly
    pub fn from_path(path: &str) -> Option<Route> {
        Route::ALL.into_iter().find(|r| r.path() == path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Target of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Route(Route),
    /// A path no view is registered for
    Unmatched(String),
}

impl Destination {
    /// Resolve a raw path. Query strings, fragments and trailing slashes
    /// are ignored; the root path resolves to [`Route::HOME`].
    pub fn resolve(raw: &str) -> Destination {
        let path = normalize(raw);
        if path == "/" {
            return Destination::Route(Route::HOME);
        }
        match Route::from_path(&path) {
            Some(route) => Destination::Route(route),
            None => Destination::Unmatched(path),
        }
    }

    pub fn is_login(&self) -> bool {
        matches!(self, Destination::Route(Route::Login))
    }

    pub fn path(&self) -> &str {
        match self {
            Destination::Route(route) => route.path(),
            Destination::Unmatched(path) => path,
        }
    }
}

impl From<Route> for Destination {
    fn from(route: Route) -> Self {
        Destination::Route(route)
    }
}

fn normalize(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let trimmed = raw[..end].trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
    }

    #[test]
    fn test_root_resolves_to_dashboard() {
        assert_eq!(Destination::resolve("/"), Destination::Route(Route::Dashboard));
        assert_eq!(Destination::resolve(""), Destination::Route(Route::Dashboard));
    }

    #[test]
    fn test_resolve_tolerates_decoration() {
        assert_eq!(Destination::resolve("/tasks/"), Destination::Route(Route::Tasks));
        assert_eq!(Destination::resolve("tasks"), Destination::Route(Route::Tasks));
        assert_eq!(
            Destination::resolve("/login?next=/tasks"),
            Destination::Route(Route::Login)
        );
        assert_eq!(Destination::resolve("/logs#top"), Destination::Route(Route::Logs));
    }

    #[test]
    fn test_unknown_path_is_unmatched() {
        let dest = Destination::resolve("/reports/2024/");
        assert_eq!(dest, Destination::Unmatched("/reports/2024".to_string()));
        assert!(!dest.is_login());
        assert_eq!(dest.path(), "/reports/2024");
    }

    #[test]
    fn test_only_login_is_login() {
        assert!(Destination::from(Route::Login).is_login());
        for route in Route::ALL.into_iter().filter(|r| !r.is_login()) {
            assert!(!Destination::from(route).is_login());
        }
    }
}
