//! Who may do what.
//!
//! Handlers ask [`authorize`] before acting, role rules live only here.

use tourhub_types::claim::{ApiClaim, Authorization as _, Role};
use tracing::debug;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListTours,
    ReadMonthlyPlan,
    CreateTour,
    UpdateTour,
    DeleteTour,
    RecomputeRatings,
    ListReviews,
    ReadReview,
    CreateReview,
    UpdateReview,
    DeleteReview,
    ManageUsers,
}

/// What the action is applied to, as far as it matters for the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Any,
    Review { author_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

const TOUR_MANAGERS: [Role; 2] = [Role::Admin, Role::LeadGuide];
const TOUR_STAFF: [Role; 3] = [Role::Admin, Role::LeadGuide, Role::Guide];

pub fn authorize(actor: &ApiClaim, action: Action, resource: Resource) -> Decision {
    let allowed = match action {
        Action::ListTours | Action::ListReviews | Action::ReadReview => true,
        Action::ReadMonthlyPlan => actor.has_any_role(TOUR_STAFF),
        Action::CreateTour | Action::UpdateTour | Action::DeleteTour => {
            actor.has_any_role(TOUR_MANAGERS)
        }
        Action::RecomputeRatings | Action::ManageUsers => actor.has_role(Role::Admin),
        Action::CreateReview => actor.has_role(Role::User),
        Action::UpdateReview | Action::DeleteReview => {
            actor.has_role(Role::Admin)
                || matches!(resource, Resource::Review { author_id } if Some(author_id) == actor.user_id())
        }
    };
    Decision::from_bool(allowed)
}

/// [`authorize`] as result, denial is 403
pub fn ensure(actor: &ApiClaim, action: Action, resource: Resource) -> ApiResult<()> {
    match authorize(actor, action, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            debug!("User {} with role {} denied {action:?}", actor.sub, actor.role);
            Err(ApiError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }
}
