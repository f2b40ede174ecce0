use kidsbook_auth::Session;

/// The caller of a request, as resolved by the bearer middleware.
///
/// `None` means anonymous: no header, or a token that did not resolve. The
/// authorization engine turns that into `Unauthenticated` where it matters.
#[derive(Debug, Clone, Default)]
pub struct CallerContext(Option<Session>);

impl CallerContext {
    pub fn new(session: Option<Session>) -> Self {
        Self(session)
    }

    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref()
    }
}
