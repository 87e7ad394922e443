use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use realty_market::marketplace::actor::{Actor, Role, USER_ID_HEADER, USER_ROLE_HEADER};
use realty_market::marketplace::collaborators::NoticeTemplate;
use realty_market::marketplace::ids::ListingId;
use realty_market::marketplace::memory::{
    InMemoryMarketplace, RecordingMediaStore, RecordingNotifier,
};
use realty_market::marketplace::query::PageDefaults;
use realty_market::marketplace::users::{User, UserRepository};
use realty_market::marketplace::{
    marketplace_router, MarketplaceServices, MarketplaceStores, API_PREFIX,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    app: Router,
    notifier: Arc<RecordingNotifier>,
    owner: Actor,
    agent: Actor,
    admin: Actor,
    visitor: Actor,
}

fn account(store: &InMemoryMarketplace, name: &str, role: Role) -> Actor {
    let mut user = User::new(name, format!("{name}@example.com"), role);
    user.password_hash = Some("$argon2id$integration".to_string());
    let user = UserRepository::insert(store, user).expect("user stored");
    Actor::new(user.id, role)
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryMarketplace::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let owner = account(&store, "listing_owner", Role::User);
    let agent = account(&store, "assigned_agent", Role::Agent);
    let admin = account(&store, "moderator", Role::Admin);
    let visitor = account(&store, "visitor", Role::User);

    let stores = MarketplaceStores::in_memory(
        store,
        notifier.clone(),
        Arc::new(RecordingMediaStore::default()),
    );
    let services = MarketplaceServices::build(stores, PageDefaults::default());

    Harness {
        app: marketplace_router(&services),
        notifier,
        owner,
        agent,
        admin,
        visitor,
    }
}

impl Harness {
    async fn send(
        &self,
        method: Method,
        path: &str,
        caller: Option<&Actor>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{API_PREFIX}{path}"));
        if let Some(actor) = caller {
            builder = builder
                .header(USER_ID_HEADER, actor.id.to_string())
                .header(USER_ROLE_HEADER, actor.role.as_str());
        }
        let body = match body {
            Some(payload) => {
                builder = builder.header("content-type", "application/json");
                Body::from(payload.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("read body");
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json payload")
        };
        (status, payload)
    }

    async fn submit_listing(&self) -> String {
        let (status, payload) = self
            .send(
                Method::POST,
                "/properties/addProperty",
                Some(&self.owner),
                Some(json!({
                    "title": "Canal view apartment",
                    "description": "Quiet apartment overlooking the canal, close to schools.",
                    "type": "شقة",
                    "category": "rent",
                    "price": 5000,
                    "area": 130,
                    "bedrooms": 3,
                    "bathrooms": 2,
                    "location": { "address": "7 Canal Rd", "city": "منوف" },
                    "contactInfo": { "name": "Hany", "phone": "01011112222", "email": "hany@example.com" },
                    "agent": self.agent.id,
                    "leaseDuration": 12,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{payload}");
        payload["data"]["id"]
            .as_str()
            .expect("listing id")
            .to_string()
    }
}

#[tokio::test]
async fn submitted_listing_is_hidden_until_approved() {
    let h = harness();
    let id = h.submit_listing().await;

    let (_, search) = h
        .send(Method::GET, "/properties/search?search=canal", None, None)
        .await;
    assert_eq!(search["pagination"]["totalDocs"], 0);

    let (status, pending) = h
        .send(Method::GET, "/properties/pending?category=rent", Some(&h.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["count"], 1);

    let (status, approved) = h
        .send(Method::PUT, &format!("/properties/{id}/approve"), Some(&h.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["data"]["status"], "available");

    let (_, search) = h
        .send(Method::GET, "/properties/search?search=canal", None, None)
        .await;
    assert_eq!(search["pagination"]["totalDocs"], 1);
    assert_eq!(search["data"][0]["id"], id.as_str());

    let sent = h.notifier.sent();
    assert!(sent
        .iter()
        .any(|notice| notice.template == NoticeTemplate::ListingApproved
            && notice.recipient == "hany@example.com"));
}

#[tokio::test]
async fn details_count_views_and_expose_derived_fields() {
    let h = harness();
    let id = h.submit_listing().await;

    h.send(Method::GET, &format!("/properties/propertyDetails/{id}"), None, None)
        .await;
    let (status, details) = h
        .send(Method::GET, &format!("/properties/propertyDetails/{id}"), None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["data"]["views"], 2);
    assert_eq!(details["data"]["mainImage"], Value::Null);
    assert_eq!(details["data"]["favoritesCount"], 0);
    assert_eq!(details["data"]["utilities"]["included"], false);
}

#[tokio::test]
async fn inquiries_reach_the_assigned_agent() {
    let h = harness();
    let id = h.submit_listing().await;
    h.send(Method::PUT, &format!("/properties/{id}/approve"), Some(&h.admin), None)
        .await;

    let (status, created) = h
        .send(
            Method::POST,
            "/property-inquiry/add-property-inquiry",
            None,
            Some(json!({
                "propertyId": id,
                "name": "Salma",
                "email": "salma@example.com",
                "phone": "+20 10 1234-5678",
                "message": "Can I visit the apartment on Friday afternoon?",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["data"]["agent"], h.agent.id.to_string());
    assert_eq!(created["data"]["status"], "new");
    let inquiry = created["data"]["id"].as_str().expect("inquiry id").to_string();

    let (status, _) = h
        .send(
            Method::GET,
            "/property-inquiry/get-all-property-inquiries",
            Some(&h.owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listed) = h
        .send(
            Method::GET,
            "/property-inquiry/get-all-property-inquiries?status=new",
            Some(&h.agent),
            None,
        )
        .await;
    assert_eq!(listed["pagination"]["totalDocs"], 1);

    let (status, updated) = h
        .send(
            Method::PUT,
            &format!("/property-inquiry/update-property-inquiry-status/{inquiry}"),
            Some(&h.agent),
            Some(json!({ "status": "responded" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["status"], "responded");

    let (status, stats) = h
        .send(
            Method::GET,
            "/property-inquiry/get-inquiry-stats",
            Some(&h.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["overview"]["totalInquiries"], 1);
    assert_eq!(stats["data"]["overview"]["respondedInquiries"], 1);

    let (_, details) = h
        .send(Method::GET, &format!("/properties/propertyDetails/{id}"), None, None)
        .await;
    assert_eq!(details["data"]["inquiriesCount"], 1);

    assert!(h
        .notifier
        .sent()
        .iter()
        .any(|notice| notice.template == NoticeTemplate::InquiryReceived));
}

#[tokio::test]
async fn inquiries_on_unpublished_listings_are_rejected() {
    let h = harness();
    let id = h.submit_listing().await;

    let (status, payload) = h
        .send(
            Method::POST,
            "/property-inquiry/add-property-inquiry",
            None,
            Some(json!({
                "propertyId": id,
                "name": "Salma",
                "email": "salma@example.com",
                "phone": "+20 10 1234-5678",
                "message": "Is this still available for rent?",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["errors"][0]["field"], "propertyId");
}

#[tokio::test]
async fn favorites_appear_in_the_wishlist() {
    let h = harness();
    let id = h.submit_listing().await;
    h.send(Method::PUT, &format!("/properties/{id}/approve"), Some(&h.admin), None)
        .await;

    for _ in 0..2 {
        let (status, payload) = h
            .send(
                Method::POST,
                &format!("/properties/{id}/favorite"),
                Some(&h.visitor),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["data"]["favoritesCount"], 1);
    }

    let (status, wishlist) = h
        .send(Method::GET, "/users/me/wishlist", Some(&h.visitor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wishlist["count"], 1);
    assert_eq!(wishlist["data"][0]["listing"], id.as_str());
    assert_eq!(wishlist["data"][0]["property"]["title"], "Canal view apartment");
}

#[tokio::test]
async fn deleted_listings_leave_the_wishlist() {
    let h = harness();
    let id = h.submit_listing().await;
    h.send(Method::PUT, &format!("/properties/{id}/approve"), Some(&h.admin), None)
        .await;
    h.send(
        Method::POST,
        &format!("/properties/{id}/favorite"),
        Some(&h.visitor),
        None,
    )
    .await;

    let (status, _) = h
        .send(
            Method::DELETE,
            &format!("/properties/deleteProperty/{id}"),
            Some(&h.owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, wishlist) = h
        .send(Method::GET, "/users/me/wishlist", Some(&h.visitor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wishlist["count"], 0);
}

#[tokio::test]
async fn wishlist_entries_are_added_removed_and_cleared() {
    let h = harness();
    let id = h.submit_listing().await;
    let path = format!("/users/me/wishlist/{id}");

    let (status, added) = h
        .send(
            Method::POST,
            &path,
            Some(&h.visitor),
            Some(json!({ "note": "  ask about parking " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{added}");
    assert_eq!(added["message"], "Property added to wishlist successfully");
    assert_eq!(added["data"]["propertyId"], id.as_str());

    let (status, again) = h.send(Method::POST, &path, Some(&h.visitor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["message"], "Property is already in wishlist");

    let (_, wishlist) = h
        .send(Method::GET, "/users/me/wishlist", Some(&h.visitor), None)
        .await;
    assert_eq!(wishlist["count"], 1);
    assert_eq!(wishlist["data"][0]["note"], "ask about parking");

    let (status, payload) = h
        .send(
            Method::POST,
            &format!("/users/me/wishlist/{}", ListingId::new()),
            Some(&h.visitor),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{payload}");

    let (status, payload) = h
        .send(
            Method::POST,
            &path,
            Some(&h.owner),
            Some(json!({ "note": "x".repeat(301) })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["errors"][0]["field"], "note");

    let (status, removed) = h.send(Method::DELETE, &path, Some(&h.visitor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["message"], "Property removed from wishlist successfully");
    let (_, wishlist) = h
        .send(Method::GET, "/users/me/wishlist", Some(&h.visitor), None)
        .await;
    assert_eq!(wishlist["count"], 0);

    h.send(Method::POST, &path, Some(&h.visitor), None).await;
    let (status, cleared) = h
        .send(Method::DELETE, "/users/me/wishlist", Some(&h.visitor), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["data"]["count"], 0);
    let (_, wishlist) = h
        .send(Method::GET, "/users/me/wishlist", Some(&h.visitor), None)
        .await;
    assert_eq!(wishlist["count"], 0);

    let (status, _) = h.send(Method::GET, "/users/me/wishlist", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn owners_manage_their_listings() {
    let h = harness();
    let id = h.submit_listing().await;

    let (status, _) = h
        .send(
            Method::PUT,
            &format!("/properties/updateProperty/{id}"),
            Some(&h.visitor),
            Some(json!({ "price": 4500 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = h
        .send(
            Method::PUT,
            &format!("/properties/updateProperty/{id}"),
            Some(&h.owner),
            Some(json!({ "price": 4500, "deposit": 9000 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["price"], 4500.0);
    assert_eq!(updated["data"]["deposit"], 9000.0);

    let (_, mine) = h
        .send(Method::GET, "/properties/myProperties", Some(&h.owner), None)
        .await;
    assert_eq!(mine["count"], 1);

    let (status, _) = h
        .send(
            Method::DELETE,
            &format!("/properties/deleteProperty/{id}"),
            Some(&h.owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .send(Method::GET, &format!("/properties/propertyDetails/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn testimonials_wait_for_moderation() {
    let h = harness();
    let (status, created) = h
        .send(
            Method::POST,
            "/testimonial",
            None,
            Some(json!({
                "name": "Youssef",
                "text": "Smooth experience from search to contract.",
                "type": "general",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Testimonial submitted for review");
    let id = created["data"]["id"].as_str().expect("testimonial id").to_string();

    let (_, approved) = h
        .send(Method::GET, "/testimonial?status=approved", None, None)
        .await;
    assert_eq!(approved["count"], 0);

    let (status, _) = h
        .send(
            Method::PATCH,
            &format!("/testimonial/{id}/status"),
            Some(&h.admin),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, approved) = h
        .send(Method::GET, "/testimonial?status=approved", None, None)
        .await;
    assert_eq!(approved["count"], 1);
}

#[tokio::test]
async fn owners_cannot_reactivate_hidden_listings() {
    let h = harness();
    let id = h.submit_listing().await;
    let (status, _) = h
        .send(
            Method::PUT,
            &format!("/properties/{id}/approve"),
            Some(&h.admin),
            Some(json!({ "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .send(
            Method::PUT,
            &format!("/properties/updateProperty/{id}"),
            Some(&h.owner),
            Some(json!({ "isActive": true })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listed) = h
        .send(Method::GET, "/properties/search?search=canal", None, None)
        .await;
    assert_eq!(listed["pagination"]["totalDocs"], 0);
}

#[tokio::test]
async fn blank_numeric_filters_are_ignored() {
    let h = harness();
    let id = h.submit_listing().await;
    h.send(Method::PUT, &format!("/properties/{id}/approve"), Some(&h.admin), None)
        .await;

    let (status, listed) = h
        .send(
            Method::GET,
            "/properties/search?bedrooms=&price%5Bgte%5D=&category=rent",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{listed}");
    assert_eq!(listed["pagination"]["totalDocs"], 1);
}

#[tokio::test]
async fn contact_messages_are_triaged_by_admins() {
    let h = harness();
    let (status, created) = h
        .send(
            Method::POST,
            "/contact/contact-us",
            None,
            Some(json!({
                "name": "Nour",
                "email": "nour@example.com",
                "subject": "Agency partnership",
                "message": "We would like to list our agency on Saknly.",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Message sent successfully");
    assert_eq!(created["data"]["status"], "pending");
    let id = created["data"]["id"].as_str().expect("message id").to_string();

    let (status, _) = h
        .send(Method::GET, "/contact/get-all-contacts", Some(&h.visitor), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = h
        .send(
            Method::PUT,
            &format!("/contact/update-contact-status/{id}"),
            Some(&h.admin),
            Some(json!({ "status": "in-progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["status"], "in-progress");

    let (_, listed) = h
        .send(
            Method::GET,
            "/contact/get-all-contacts?status=in-progress",
            Some(&h.admin),
            None,
        )
        .await;
    assert_eq!(listed["count"], 1);

    let (status, _) = h
        .send(
            Method::DELETE,
            &format!("/contact/delete-contact/{id}"),
            Some(&h.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h
        .send(
            Method::DELETE,
            &format!("/contact/delete-contact/{id}"),
            Some(&h.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
