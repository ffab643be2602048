//! The full endpoint registry. Declaration order matters: resolution is
//! first-match-wins, so literal segments are declared before capture
//! patterns that would also match them.

use axum::http::Method;
use serde_json::{json, Value};

use crate::error::ApiResponse;
use crate::handlers::{
    accounts, activity, announcements, evaluations, events, justifications, officers, patrols,
    util,
};
use crate::pipeline::RequestContext;

use super::{validate_as, BroadcastSpec, RouteDescriptor, RouteTable};

fn response_data(_ctx: &RequestContext, response: &ApiResponse) -> Value {
    response.data.clone().unwrap_or(Value::Null)
}

pub fn routes() -> Result<RouteTable, regex::Error> {
    RouteTable::builder()
        // accounts
        .route(
            r"/accounts/login",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(accounts::login(ctx)))
                .requires_force()
                .body(validate_as::<accounts::LoginBody>),
        )
        .route(
            r"/accounts/logout",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(accounts::logout(ctx))).requires_session(),
        )
        .route(
            r"/accounts/(\d+)/password",
            Method::PATCH,
            RouteDescriptor::new(|ctx| Box::pin(accounts::change_password(ctx)))
                .requires_session()
                .body(validate_as::<accounts::ChangePasswordBody>),
        )
        .route(
            r"/accounts/(\d+)",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(accounts::get(ctx)))
                .requires_session()
                .intents(&["accounts"]),
        )
        // officers
        .route(
            r"/officers",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(officers::list(ctx)))
                .requires_session()
                .filters(officers::list_filters()),
        )
        .route(
            r"/officers",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(officers::create(ctx)))
                .requires_session()
                .intents(&["officers"])
                .body(validate_as::<officers::CreateOfficerBody>),
        )
        // sub-resources before the bare capture, which would match them
        .route(
            r"/officers/(\d+)/hours/(\d+)",
            Method::DELETE,
            RouteDescriptor::new(|ctx| Box::pin(activity::delete(ctx)))
                .requires_session()
                .intents(&["activity"]),
        )
        .route(
            r"/officers/(\d+)/hours",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(activity::list(ctx)))
                .requires_session()
                .filters(activity::list_filters()),
        )
        .route(
            r"/officers/(\d+)/hours",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(activity::create(ctx)))
                .requires_session()
                .intents(&["activity"])
                .body(validate_as::<activity::CreateHoursBody>),
        )
        .route(
            r"/officers/(\d+)/justifications/(\d+)",
            Method::PATCH,
            RouteDescriptor::new(|ctx| Box::pin(justifications::decide(ctx)))
                .requires_session()
                .intents(&["activity"])
                .body(validate_as::<justifications::DecideJustificationBody>),
        )
        .route(
            r"/officers/(\d+)/justifications",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(justifications::list(ctx)))
                .requires_session()
                .filters(justifications::list_filters()),
        )
        .route(
            r"/officers/(\d+)/justifications",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(justifications::create(ctx)))
                .requires_session()
                .body(validate_as::<justifications::CreateJustificationBody>),
        )
        .route(
            r"/officers/(\d+)/evaluations",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(evaluations::list(ctx)))
                .requires_session()
                .filters(evaluations::list_filters()),
        )
        .route(
            r"/officers/(\d+)/evaluations",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(evaluations::create(ctx)))
                .requires_session()
                .body(validate_as::<evaluations::CreateEvaluationBody>),
        )
        .route(
            r"/officers/(\d+)",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(officers::get(ctx))).requires_session(),
        )
        .route(
            r"/officers/(\d+)",
            Method::PATCH,
            RouteDescriptor::new(|ctx| Box::pin(officers::update(ctx)))
                .requires_session()
                .intents(&["officers"])
                .body(validate_as::<officers::UpdateOfficerBody>),
        )
        .route(
            r"/officers/(\d+)",
            Method::DELETE,
            RouteDescriptor::new(|ctx| Box::pin(officers::delete(ctx)))
                .requires_session()
                .intents(&["officers"]),
        )
        // patrols
        .route(
            r"/patrols",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(patrols::list(ctx)))
                .requires_session()
                .filters(patrols::list_filters()),
        )
        .route(
            r"/patrols",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(patrols::create(ctx)))
                .requires_session()
                .body(validate_as::<patrols::CreatePatrolBody>)
                .broadcast(BroadcastSpec {
                    event: "patrols:changed",
                    patrol: true,
                    body: response_data,
                }),
        )
        .route(
            r"/patrols/(\d+)",
            Method::PATCH,
            RouteDescriptor::new(|ctx| Box::pin(patrols::update(ctx)))
                .requires_session()
                .body(validate_as::<patrols::UpdatePatrolBody>)
                .broadcast(BroadcastSpec {
                    event: "patrols:changed",
                    patrol: true,
                    body: |ctx, _res| json!({ "id": ctx.captures.first() }),
                }),
        )
        // events
        .route(
            r"/events",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(events::list(ctx)))
                .requires_session()
                .filters(events::list_filters()),
        )
        .route(
            r"/events",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(events::create(ctx)))
                .requires_session()
                .body(validate_as::<events::CreateEventBody>),
        )
        .route(
            r"/events/(\d+)",
            Method::DELETE,
            RouteDescriptor::new(|ctx| Box::pin(events::delete(ctx)))
                .requires_session()
                .intents(&["events"]),
        )
        // announcements
        .route(
            r"/announcements",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(announcements::list(ctx)))
                .requires_session()
                .filters(announcements::list_filters()),
        )
        .route(
            r"/announcements",
            Method::POST,
            RouteDescriptor::new(|ctx| Box::pin(announcements::create(ctx)))
                .requires_session()
                .intents(&["announcements"])
                .broadcast(BroadcastSpec {
                    event: "announcements:created",
                    patrol: false,
                    body: response_data,
                })
                .body(validate_as::<announcements::CreateAnnouncementBody>),
        )
        .route(
            r"/announcements/(\d+)",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(announcements::get(ctx))).requires_session(),
        )
        // util lookup tables, force-scoped but public
        .route(
            r"/util/patents",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(util::patents(ctx))).requires_force(),
        )
        .route(
            r"/util/statuses",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(util::statuses(ctx))).requires_force(),
        )
        .route(
            r"/util/intents",
            Method::GET,
            RouteDescriptor::new(|ctx| Box::pin(util::intents(ctx))).requires_force(),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_builds() {
        assert!(routes().is_ok());
    }

    #[test]
    fn literal_util_routes_resolve_before_captures() {
        let table = routes().unwrap();
        let resolved = table.resolve("/util/patents", &Method::GET).unwrap();
        assert!(resolved.captures.is_empty());
    }

    #[test]
    fn officer_subresources_resolve_before_bare_capture() {
        let table = routes().unwrap();
        let resolved = table.resolve("/officers/123456789/hours", &Method::GET).unwrap();
        assert_eq!(resolved.captures, vec!["123456789".to_string()]);
    }

    #[test]
    fn login_is_public_but_force_scoped() {
        let table = routes().unwrap();
        let resolved = table.resolve("/accounts/login", &Method::POST).unwrap();
        assert!(resolved.descriptor.requires_force);
        assert!(!resolved.descriptor.requires_session);
    }

    #[test]
    fn officer_mutations_carry_the_officers_intent() {
        let table = routes().unwrap();
        for method in [Method::POST] {
            let resolved = table.resolve("/officers", &method).unwrap();
            assert_eq!(resolved.descriptor.intents, &["officers"]);
        }
        let resolved = table.resolve("/officers/1", &Method::PATCH).unwrap();
        assert_eq!(resolved.descriptor.intents, &["officers"]);
    }
}
