//! Access gate for admin navigation and the navigation shell's menu state.
use std::fmt;

use crate::session::SessionContext;

pub const LOGIN_PATH: &str = "/login";

/// Viewports narrower than this (in CSS pixels) get the collapsible menu.
pub const MOBILE_BREAKPOINT: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminView {
    Bookings,
    Reels,
    Gallery,
    RoomImages,
    Bento,
    Pricing,
    Feedback,
}

impl AdminView {
    pub const ALL: [AdminView; 7] = [
        AdminView::Bookings,
        AdminView::Reels,
        AdminView::Gallery,
        AdminView::RoomImages,
        AdminView::Bento,
        AdminView::Pricing,
        AdminView::Feedback,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            AdminView::Bookings => "/admin/forms",
            AdminView::Reels => "/admin/reels",
            AdminView::Gallery => "/admin/gallery",
            AdminView::RoomImages => "/admin/rooms",
            AdminView::Bento => "/admin/bento",
            AdminView::Pricing => "/admin/packages",
            AdminView::Feedback => "/admin/feedback",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AdminView::Bookings => "Forms Data",
            AdminView::Reels => "Reels",
            AdminView::Gallery => "Gallery",
            AdminView::RoomImages => "Room Images",
            AdminView::Bento => "Hero Bento",
            AdminView::Pricing => "Packages",
            AdminView::Feedback => "Feedback",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        AdminView::ALL
            .into_iter()
            .find(|v| v.path().trim_start_matches("/admin/") == segment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Admin(AdminView),
}

impl Route {
    /// Map a navigation path to a route. `/admin` on its own lands on the
    /// bookings view; anything unknown falls back to the login page.
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        if trimmed == "/admin" {
            return Route::Admin(AdminView::Bookings);
        }
        match trimmed.strip_prefix("/admin/") {
            Some(segment) => AdminView::from_segment(segment)
                .map(Route::Admin)
                .unwrap_or(Route::Login),
            None => Route::Login,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => LOGIN_PATH,
            Route::Admin(view) => view.path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render(AdminView),
    Redirect(&'static str),
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Render(view) => write!(f, "render {}", view.path()),
            GateDecision::Redirect(to) => write!(f, "redirect {}", to),
        }
    }
}

/// Decides per navigation whether admin content may be shown. The session is
/// consulted when `resolve` runs and not observed afterwards.
#[derive(Debug, Clone)]
pub struct AccessGate {
    session: SessionContext,
}

impl AccessGate {
    pub fn new(session: SessionContext) -> Self {
        Self { session }
    }

    pub fn resolve(&self, route: Route) -> GateDecision {
        match route {
            Route::Admin(view) if self.session.is_authenticated() => GateDecision::Render(view),
            _ => GateDecision::Redirect(LOGIN_PATH),
        }
    }

    pub fn navigate(&self, path: &str) -> GateDecision {
        self.resolve(Route::parse(path))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MenuState {
    #[default]
    Closed,
    Open,
}

/// Menu toggle for the navigation shell.
#[derive(Debug, Clone, Default)]
pub struct NavShell {
    menu: MenuState,
}

impl NavShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn menu(&self) -> MenuState {
        self.menu
    }

    pub fn toggle(&mut self) -> MenuState {
        self.menu = match self.menu {
            MenuState::Closed => MenuState::Open,
            MenuState::Open => MenuState::Closed,
        };
        self.menu
    }

    /// Pointer-down anywhere in the document. `inside` covers both the menu
    /// and its toggle button. Only closes, and only on narrow viewports.
    pub fn pointer_down(&mut self, inside: bool, viewport_width: u32) -> MenuState {
        if self.menu == MenuState::Open && !inside && viewport_width < MOBILE_BREAKPOINT {
            self.menu = MenuState::Closed;
        }
        self.menu
    }

    /// Following a navigation link collapses the menu on narrow viewports.
    pub fn link_selected(&mut self, viewport_width: u32) -> MenuState {
        if self.menu == MenuState::Open && viewport_width < MOBILE_BREAKPOINT {
            self.menu = MenuState::Closed;
        }
        self.menu
    }
}
