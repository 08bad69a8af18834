pub mod attendance;
pub mod blocks;
pub mod feed;
pub mod health;
pub mod interactions;
pub mod matches;
pub mod profiles;
pub mod sessions;
pub mod venues;

use mingle_shared::errors::{AppError, ErrorCode};
use validator::{Validate, ValidationErrors};

fn validation_error(e: ValidationErrors) -> AppError {
    AppError::new(ErrorCode::ValidationError, e.to_string())
}

/// Runs the `validator` rules of a request body.
pub(crate) fn validated<T: Validate>(req: T) -> Result<T, AppError> {
    req.validate().map_err(validation_error)?;
    Ok(req)
}


#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use serde_json::json;

    use super::testing::{token, TestApp};
    use mingle_shared::types::auth::UserRole;

    #[tokio::test]
    async fn guest_flow_from_entry_to_match() {
        let app = TestApp::new();
        let (_, staff) = token(UserRole::Staff);
        let (alice, alice_token) = token(UserRole::Guest);
        let (bob, bob_token) = token(UserRole::Guest);

        let (status, venue) = app
            .call(Method::POST, "/venues", Some(&staff), Some(json!({ "name": "Harbour Bar" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let venue_id = venue["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .call(Method::POST, &format!("/venues/{venue_id}/session"), Some(&staff), Some(json!({ "duration_hours": 3 })))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, a_att) = app
            .call(Method::POST, &format!("/venues/{venue_id}/attendance"), Some(&alice_token), Some(json!({ "phone_number": "+1 555 0100" })))
            .await;
        let (_, b_att) = app
            .call(Method::POST, &format!("/venues/{venue_id}/attendance"), Some(&bob_token), None)
            .await;
        assert_eq!(a_att["data"]["created"], true);

        let (status, feed) = app
            .call(Method::GET, &format!("/venues/{venue_id}/feed"), Some(&alice_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed["data"][0]["profile_id"], bob.to_string());

        let (_, ab) = app
            .call(
                Method::POST,
                "/interactions",
                Some(&alice_token),
                Some(json!({ "receiver_id": bob, "kind": "like", "attendance_id": a_att["data"]["attendance"]["id"] })),
            )
            .await;
        let (_, ba) = app
            .call(
                Method::POST,
                "/interactions",
                Some(&bob_token),
                Some(json!({ "receiver_id": alice, "kind": "like", "attendance_id": b_att["data"]["attendance"]["id"] })),
            )
            .await;

        let ba_id = ba["data"]["interaction"]["id"].as_str().unwrap().to_string();
        let ab_id = ab["data"]["interaction"]["id"].as_str().unwrap().to_string();
        let (_, first) = app
            .call(Method::PUT, &format!("/interactions/{ba_id}/respond"), Some(&alice_token), Some(json!({ "decision": "accept" })))
            .await;
        assert!(first["data"]["matched"].is_null());

        let (status, second) = app
            .call(Method::PUT, &format!("/interactions/{ab_id}/respond"), Some(&bob_token), Some(json!({ "decision": "accept" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let link = second["data"]["matched"]["contact_link"].as_str().unwrap();
        assert!(link.starts_with("https://wa.me/15550100"));

        let (_, matches) = app.call(Method::GET, "/matches", Some(&alice_token), None).await;
        assert_eq!(matches["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expired_session_answers_conflict() {
        let app = TestApp::new();
        let (_, staff) = token(UserRole::Staff);
        let (_, guest) = token(UserRole::Guest);

        let (_, venue) = app
            .call(Method::POST, "/venues", Some(&staff), Some(json!({ "name": "Cellar" })))
            .await;
        let venue_id = venue["data"]["id"].as_str().unwrap().to_string();
        app.call(Method::POST, &format!("/venues/{venue_id}/session"), Some(&staff), Some(json!({ "duration_hours": 1 })))
            .await;

        app.clock.advance(Duration::hours(2));

        let (status, body) = app
            .call(Method::POST, &format!("/venues/{venue_id}/attendance"), Some(&guest), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "E1001");
        assert_eq!(body["error"]["message"], "session ended");
    }

    #[tokio::test]
    async fn staff_routes_reject_guests() {
        let app = TestApp::new();
        let (_, guest) = token(UserRole::Guest);

        let (status, _) = app
            .call(Method::POST, "/venues", Some(&guest), Some(json!({ "name": "Nope" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.call(Method::GET, "/matches", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_session_duration_is_a_validation_error() {
        let app = TestApp::new();
        let (_, staff) = token(UserRole::Staff);
        let (_, venue) = app
            .call(Method::POST, "/venues", Some(&staff), Some(json!({ "name": "Loft" })))
            .await;
        let venue_id = venue["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(Method::POST, &format!("/venues/{venue_id}/session"), Some(&staff), Some(json!({ "duration_hours": 48 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E0002");
    }

    #[tokio::test]
    async fn opted_in_staff_show_up_in_the_feed() {
        let app = TestApp::new();
        let (staff_id, staff) = token(UserRole::Staff);
        let (_, guest) = token(UserRole::Guest);

        let (_, venue) = app
            .call(Method::POST, "/venues", Some(&staff), Some(json!({ "name": "Dockside" })))
            .await;
        let venue_id = venue["data"]["id"].as_str().unwrap().to_string();
        app.call(Method::POST, &format!("/venues/{venue_id}/session"), Some(&staff), Some(json!({})))
            .await;
        for who in [&staff, &guest] {
            let (status, _) = app
                .call(Method::POST, &format!("/venues/{venue_id}/attendance"), Some(who), None)
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        let feed_uri = format!("/venues/{venue_id}/feed");
        let (_, feed) = app.call(Method::GET, &feed_uri, Some(&guest), None).await;
        assert!(feed["data"].as_array().unwrap().is_empty());

        let (status, _) = app
            .call(Method::PATCH, "/me/feed-visibility", Some(&guest), Some(json!({ "appear_in_feed": true })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, me) = app
            .call(Method::PATCH, "/me/feed-visibility", Some(&staff), Some(json!({ "appear_in_feed": true })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["data"]["appear_in_feed"], true);

        let (_, feed) = app.call(Method::GET, &feed_uri, Some(&guest), None).await;
        let entries = feed["data"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["profile_id"], staff_id.to_string());

        let (status, history) = app
            .call(Method::GET, &format!("/venues/{venue_id}/sessions"), Some(&staff), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["data"].as_array().unwrap().len(), 1);

        let (status, profile) = app.call(Method::GET, "/me", Some(&staff), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["data"]["is_staff"], true);
    }

    #[tokio::test]
    async fn self_block_is_invalid_target() {
        let app = TestApp::new();
        let (me, my_token) = token(UserRole::Guest);
        app.call(Method::POST, "/me", Some(&my_token), Some(json!({}))).await;

        let (status, body) = app
            .call(Method::POST, &format!("/blocks/{me}"), Some(&my_token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E3002");
    }
}
