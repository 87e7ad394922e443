use std::sync::Arc;

use serde_json::json;

use super::common::{
    draft, draft_json, fixture, fixture_with, images, published, UnavailableListings,
};
use crate::error::{MarketError, RepositoryError};
use crate::marketplace::collaborators::NoticeTemplate;
use crate::marketplace::ids::{AgencyId, ListingId};
use crate::marketplace::listings::domain::{Category, City, ListingStatus};
use crate::marketplace::listings::{ApprovalDecision, ListingRepository, ListingService};
use crate::marketplace::memory::{RecordingMediaStore, RecordingNotifier};
use crate::marketplace::query::QueryParams;
use crate::marketplace::users::UserService;

#[test]
fn regular_users_submit_for_review() {
    let fx = fixture();
    let listing = fx
        .service
        .create(&fx.owner, draft(Category::Sale))
        .expect("listing created");

    assert_eq!(listing.status, ListingStatus::Pending);
    assert!(!listing.is_approved);
    assert!(!listing.is_active);
    assert!(listing.approved_by.is_none());
    assert_eq!(listing.owner, fx.owner.id);
    assert!(listing.slug.starts_with("bright-apartment-near-the-university-"));
    assert!(fx.fetch(&listing.id).is_some());
}

#[test]
fn agents_publish_directly() {
    let fx = fixture();
    let listing = fx
        .service
        .create(&fx.agent, draft(Category::Rent))
        .expect("listing created");

    assert_eq!(listing.status, ListingStatus::Available);
    assert!(listing.is_approved);
    assert!(listing.is_active);
    assert_eq!(listing.approved_by, Some(fx.agent.id));
    assert!(listing.approved_at.is_some());
}

#[test]
fn json_create_rejects_foreign_category_keys() {
    let fx = fixture();
    let mut body = draft_json("rent");
    body["downPayment"] = json!(100_000);

    match fx.service.create_from_json(&fx.owner, body) {
        Err(MarketError::Validation(errors)) => assert!(errors.has_field("downPayment")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn json_create_requires_a_known_category() {
    let fx = fixture();
    match fx.service.create_from_json(&fx.owner, draft_json("lease")) {
        Err(MarketError::Validation(errors)) => assert!(errors.has_field("category")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn json_create_marks_the_first_image_main() {
    let fx = fixture();
    let listing = fx
        .service
        .create_from_json(&fx.owner, draft_json("sale"))
        .expect("listing created");

    assert!(listing.images[0].is_main);
    assert!(!listing.images[1].is_main);
    assert_eq!(listing.category(), Category::Sale);
}

#[test]
fn create_links_the_listing_to_its_agency() {
    let fx = fixture();
    let agency = fx.insert_agency();
    let mut payload = draft(Category::Sale);
    payload.agency = Some(agency.id);

    let listing = fx.service.create(&fx.agent, payload).expect("listing created");
    assert_eq!(fx.fetch_agency(&agency).listings, vec![listing.id]);
}

#[test]
fn create_with_unknown_agency_is_not_found() {
    let fx = fixture();
    let mut payload = draft(Category::Sale);
    payload.agency = Some(AgencyId::new());

    let err = fx
        .service
        .create(&fx.agent, payload)
        .expect_err("agency missing");
    assert!(matches!(err, MarketError::NotFound { entity: "agency", .. }));
}

#[test]
fn browse_paginates_with_ceil_page_count() {
    let fx = fixture();
    for age in 0..25 {
        fx.insert(published(fx.owner.id, age));
    }

    let params = QueryParams::new().with("page", "3").with("limit", "10");
    let page = fx.service.browse(&params).expect("page");

    assert_eq!(page.data.len(), 5);
    assert_eq!(page.pagination.total_docs, 25);
    assert_eq!(page.pagination.total_pages, 3);
    assert_eq!(page.pagination.current_page, 3);
    assert!(!page.pagination.has_next);
    assert!(page.pagination.has_prev);
}

#[test]
fn browse_filters_by_price_range() {
    let fx = fixture();
    for price in [500_000.0, 1_500_000.0, 3_000_000.0] {
        let mut listing = published(fx.owner.id, 0);
        listing.price = price;
        fx.insert(listing);
    }

    let params = QueryParams::new()
        .with("price[gte]", "1000000")
        .with("price[lte]", "2000000");
    let page = fx.service.browse(&params).expect("page");

    assert_eq!(page.pagination.total_docs, 1);
    assert_eq!(page.data[0]["price"], 1_500_000.0);
}

#[test]
fn browse_matches_any_listed_city() {
    let fx = fixture();
    for city in [City::Tanta, City::Menouf, City::ShebinElKom] {
        let mut listing = published(fx.owner.id, 0);
        listing.location.city = city;
        fx.insert(listing);
    }

    let params = QueryParams::new().with("location.city", "طنطا,منوف");
    let page = fx.service.browse(&params).expect("page");

    assert_eq!(page.pagination.total_docs, 2);
    for document in &page.data {
        let city = document["location"]["city"].as_str().expect("city");
        assert!(city == "طنطا" || city == "منوف", "unexpected city {city}");
    }
}

#[test]
fn search_finds_text_in_descriptions_of_public_listings_only() {
    let fx = fixture();
    let mut villa = published(fx.owner.id, 0);
    villa.description = "Garden فيلا with a private pool.".to_string();
    let villa = fx.insert(villa);

    let mut hidden = published(fx.owner.id, 1);
    hidden.description = "Another فيلا awaiting review.".to_string();
    hidden.is_approved = false;
    fx.insert(hidden);

    fx.insert(published(fx.owner.id, 2));

    let params = QueryParams::new().with("search", "فيلا");
    let public = fx.service.search(&params).expect("search");
    assert_eq!(public.pagination.total_docs, 1);
    assert_eq!(public.data[0]["id"], villa.id.to_string());

    let everything = fx.service.browse(&params).expect("browse");
    assert_eq!(everything.pagination.total_docs, 2);
}

#[test]
fn search_cannot_lift_the_public_restriction() {
    let fx = fixture();
    let mut hidden = published(fx.owner.id, 0);
    hidden.is_active = false;
    fx.insert(hidden);

    let params = QueryParams::new().with("isActive", "false");
    let page = fx.service.search(&params).expect("search");
    assert!(page.data.is_empty());
}

#[test]
fn empty_results_report_zero_pages() {
    let fx = fixture();
    fx.insert(published(fx.owner.id, 0));

    let params = QueryParams::new().with("location.city", "تلا").with("page", "2");
    let page = fx.service.browse(&params).expect("page");

    assert!(page.data.is_empty());
    assert_eq!(page.pagination.total_docs, 0);
    assert_eq!(page.pagination.total_pages, 0);
    assert_eq!(page.pagination.current_page, 2);
    assert!(!page.pagination.has_next);
}

#[test]
fn browse_rejects_non_numeric_bounds() {
    let fx = fixture();
    let params = QueryParams::new().with("price[gte]", "cheap");
    assert!(matches!(
        fx.service.browse(&params),
        Err(MarketError::InvalidQuery(_))
    ));
}

#[test]
fn details_count_views() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));

    fx.service.details(&listing.id).expect("first view");
    let seen = fx.service.details(&listing.id).expect("second view");
    assert_eq!(seen.views, 2);

    let err = fx.service.details(&ListingId::new()).expect_err("missing");
    assert!(matches!(err, MarketError::NotFound { entity: "listing", .. }));
}

#[test]
fn similar_excludes_the_source_and_private_listings() {
    let fx = fixture();
    let source = fx.insert(published(fx.owner.id, 0));
    let twin = fx.insert(published(fx.owner.id, 1));
    let mut hidden = published(fx.owner.id, 2);
    hidden.is_approved = false;
    fx.insert(hidden);

    let similar = fx.service.similar(&source.id).expect("similar");
    let ids: Vec<_> = similar.iter().map(|listing| listing.id).collect();
    assert_eq!(ids, vec![twin.id]);
}

#[test]
fn featured_lists_most_viewed_with_slider_images() {
    let fx = fixture();
    for views in 0..12u64 {
        let mut listing = published(fx.owner.id, 0);
        listing.views = views * 10;
        listing.images = images(2);
        listing.normalize_images();
        fx.insert(listing);
    }

    let featured = fx.service.featured().expect("featured");
    assert_eq!(featured.len(), 10);
    assert_eq!(featured[0]["views"], 110);
    assert_eq!(featured[9]["views"], 20);
    assert_eq!(featured[0]["sliderImages"].as_array().map(Vec::len), Some(2));
    assert_eq!(featured[0]["statusLabel"], ListingStatus::Available.arabic_label());
}

#[test]
fn update_rejects_protected_fields_and_category_changes() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));

    let patch = json!({ "views": 1000, "isApproved": true, "category": "rent" });
    match fx.service.update(&fx.owner, &listing.id, patch) {
        Err(MarketError::Validation(errors)) => {
            assert!(errors.has_field("views"));
            assert!(errors.has_field("isApproved"));
            assert!(errors.has_field("category"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(fx.fetch(&listing.id).expect("stored").revision, 0);
}

#[test]
fn update_by_stranger_is_forbidden() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));

    let err = fx
        .service
        .update(&fx.stranger, &listing.id, json!({ "price": 1.0 }))
        .expect_err("not the owner");
    assert!(matches!(err, MarketError::Forbidden(_)));
}

#[test]
fn owners_cannot_change_visibility() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));
    assert!(listing.is_active);

    let err = fx
        .service
        .update(&fx.owner, &listing.id, json!({ "isActive": false }))
        .expect_err("owner toggles visibility");
    assert!(matches!(err, MarketError::Forbidden(_)));
    let stored = fx.fetch(&listing.id).expect("stored");
    assert!(stored.is_active);
    assert_eq!(stored.revision, 0);

    let hidden = fx
        .service
        .update(&fx.admin, &listing.id, json!({ "isActive": false }))
        .expect("admin toggles visibility");
    assert!(!hidden.is_active);
}

#[test]
fn assigned_agent_may_change_visibility() {
    let fx = fixture();
    let mut listing = published(fx.owner.id, 0);
    listing.agent = Some(fx.agent.id);
    let listing = fx.insert(listing);

    let updated = fx
        .service
        .update(&fx.agent, &listing.id, json!({ "isActive": false }))
        .expect("agent update");
    assert!(!updated.is_active);
}

#[test]
fn update_merges_fields_and_regenerates_the_slug() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));

    let updated = fx
        .service
        .update(
            &fx.owner,
            &listing.id,
            json!({
                "title": "Renovated family flat",
                "price": 2_000_000,
                "location": { "district": "El Bahr" },
                "paymentMethod": "installment",
            }),
        )
        .expect("updated");

    assert_eq!(updated.price, 2_000_000.0);
    assert_eq!(updated.location.district.as_deref(), Some("El Bahr"));
    assert_eq!(updated.location.address, listing.location.address);
    assert!(updated.slug.starts_with("renovated-family-flat-"));
    assert_eq!(updated.revision, 1);
    assert!(updated.is_approved);
    assert_eq!(fx.fetch(&listing.id), Some(updated));
}

#[test]
fn assigned_agent_may_update() {
    let fx = fixture();
    let mut listing = published(fx.owner.id, 0);
    listing.agent = Some(fx.agent.id);
    let listing = fx.insert(listing);

    let updated = fx
        .service
        .update(&fx.agent, &listing.id, json!({ "isNegotiable": true }))
        .expect("agent update");
    assert!(updated.is_negotiable);
    assert_eq!(updated.slug, listing.slug);
}

#[test]
fn update_replaces_images_and_discards_removed_ones() {
    let fx = fixture();
    let mut listing = published(fx.owner.id, 0);
    listing.images = images(3);
    listing.normalize_images();
    let listing = fx.insert(listing);

    let updated = fx
        .service
        .update(
            &fx.owner,
            &listing.id,
            json!({
                "imagesToDelete": ["img-0"],
                "newImages": [{ "storageId": "img-new", "url": "https://cdn.example.com/new.jpg" }],
            }),
        )
        .expect("updated");

    let ids: Vec<&str> = updated
        .images
        .iter()
        .map(|image| image.storage_id.as_str())
        .collect();
    assert_eq!(ids, vec!["img-1", "img-2", "img-new"]);
    assert!(updated.images[0].is_main);
    assert_eq!(fx.media.discarded(), vec!["img-0".to_string()]);
}

#[test]
fn managed_image_list_keeps_only_known_images() {
    let fx = fixture();
    let mut listing = published(fx.owner.id, 0);
    listing.images = images(2);
    listing.normalize_images();
    let listing = fx.insert(listing);

    let updated = fx
        .service
        .update(
            &fx.owner,
            &listing.id,
            json!({
                "images": [
                    { "storageId": "img-1", "url": "https://evil.example.com/x.jpg", "isMain": true },
                    { "storageId": "unknown", "url": "https://cdn.example.com/u.jpg" }
                ],
            }),
        )
        .expect("updated");

    assert_eq!(updated.images.len(), 1);
    assert_eq!(updated.images[0].storage_id, "img-1");
    assert_eq!(updated.images[0].url, "https://cdn.example.com/1.jpg");
    assert!(updated.images[0].is_main);
    assert_eq!(fx.media.discarded(), vec!["img-0".to_string()]);
}

#[test]
fn update_moves_agency_references() {
    let fx = fixture();
    let first = fx.insert_agency();
    let second = fx.insert_agency();
    let mut payload = draft(Category::Sale);
    payload.agency = Some(first.id);
    let listing = fx.service.create(&fx.agent, payload).expect("created");

    fx.service
        .update(&fx.agent, &listing.id, json!({ "agency": second.id }))
        .expect("moved");

    assert!(fx.fetch_agency(&first).listings.is_empty());
    assert_eq!(fx.fetch_agency(&second).listings, vec![listing.id]);
}

#[test]
fn delete_discards_images_and_unlinks_the_agency() {
    let fx = fixture();
    let agency = fx.insert_agency();
    let mut payload = draft(Category::Sale);
    payload.agency = Some(agency.id);
    payload.images = images(2);
    let listing = fx.service.create(&fx.owner, payload).expect("created");

    fx.service.delete(&fx.owner, &listing.id).expect("deleted");

    assert!(fx.fetch(&listing.id).is_none());
    assert!(fx.fetch_agency(&agency).listings.is_empty());
    assert_eq!(
        fx.media.discarded(),
        vec!["img-0".to_string(), "img-1".to_string()]
    );
}

#[test]
fn delete_survives_media_failures() {
    let fx = fixture_with(
        Arc::new(RecordingNotifier::default()),
        Arc::new(RecordingMediaStore::failing()),
    );
    let mut listing = published(fx.owner.id, 0);
    listing.images = images(1);
    listing.normalize_images();
    let listing = fx.insert(listing);

    fx.service.delete(&fx.owner, &listing.id).expect("deleted");
    assert!(fx.fetch(&listing.id).is_none());
}

#[test]
fn owned_listings_belong_to_the_caller() {
    let fx = fixture();
    let mine = fx.insert(published(fx.owner.id, 0));
    fx.insert(published(fx.stranger.id, 0));

    let owned = fx.service.owned_by(&fx.owner).expect("owned");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, mine.id);
}

#[test]
fn pending_queue_is_admin_only_and_filterable() {
    let fx = fixture();
    fx.pending();
    fx.service
        .create(&fx.owner, draft(Category::Sale))
        .expect("pending sale");
    fx.insert(published(fx.owner.id, 0));

    assert!(matches!(
        fx.service.pending(&fx.agent, None),
        Err(MarketError::Forbidden(_))
    ));
    assert_eq!(fx.service.pending(&fx.admin, None).expect("all").len(), 2);

    let rent = fx
        .service
        .pending(&fx.admin, Some(Category::Rent))
        .expect("rent");
    assert_eq!(rent.len(), 1);
    assert_eq!(rent[0].category(), Category::Rent);
}

#[test]
fn approval_publishes_and_notifies_the_owner() {
    let fx = fixture();
    let listing = fx.pending();

    let approved = fx
        .service
        .approve(&fx.admin, &listing.id, ApprovalDecision::default())
        .expect("approved");

    assert_eq!(approved.status, ListingStatus::Available);
    assert!(approved.is_approved);
    assert!(approved.is_active);
    assert_eq!(approved.approved_by, Some(fx.admin.id));
    assert_eq!(approved.revision, 1);

    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, NoticeTemplate::ListingApproved);
    assert_eq!(sent[0].recipient, "omar@example.com");
    assert_eq!(sent[0].details["listing_id"], listing.id.to_string());
}

#[test]
fn approval_falls_back_to_the_account_email() {
    let fx = fixture();
    let mut payload = draft(Category::Rent);
    payload.contact_info.email = None;
    let listing = fx.service.create(&fx.owner, payload).expect("pending");

    fx.service
        .approve(&fx.admin, &listing.id, ApprovalDecision::default())
        .expect("approved");
    assert_eq!(fx.notifier.sent()[0].recipient, fx.user(&fx.owner).email);
}

#[test]
fn approval_honors_explicit_decision() {
    let fx = fixture();
    let listing = fx.pending();
    let decision = ApprovalDecision {
        status: Some(ListingStatus::Rented),
        is_active: Some(false),
        is_approved: None,
    };

    let approved = fx
        .service
        .approve(&fx.admin, &listing.id, decision)
        .expect("approved");
    assert_eq!(approved.status, ListingStatus::Rented);
    assert!(!approved.is_active);
    assert!(approved.is_approved);
}

#[test]
fn approval_requires_admin_and_a_pending_listing() {
    let fx = fixture();
    let listing = fx.pending();

    assert!(matches!(
        fx.service
            .approve(&fx.agent, &listing.id, ApprovalDecision::default()),
        Err(MarketError::Forbidden(_))
    ));

    fx.service
        .approve(&fx.admin, &listing.id, ApprovalDecision::default())
        .expect("first approval");
    assert!(matches!(
        fx.service
            .approve(&fx.admin, &listing.id, ApprovalDecision::default()),
        Err(MarketError::Conflict(_))
    ));
}

#[test]
fn approval_succeeds_when_notification_fails() {
    let fx = fixture_with(
        Arc::new(RecordingNotifier::failing()),
        Arc::new(RecordingMediaStore::default()),
    );
    let listing = fx.pending();

    let approved = fx
        .service
        .approve(&fx.admin, &listing.id, ApprovalDecision::default())
        .expect("approved despite notifier");
    assert!(approved.is_approved);
    assert!(fx.fetch(&listing.id).expect("stored").is_approved);
}

#[test]
fn denial_notifies_with_reason_and_removes_the_listing() {
    let fx = fixture();
    let mut payload = draft(Category::Rent);
    payload.images = images(1);
    let listing = fx.service.create(&fx.owner, payload).expect("pending");

    fx.service
        .deny(&fx.admin, &listing.id, Some("  Blurry photos ".to_string()))
        .expect("denied");

    assert!(fx.fetch(&listing.id).is_none());
    assert_eq!(fx.media.discarded(), vec!["img-0".to_string()]);
    let sent = fx.notifier.sent();
    assert_eq!(sent[0].template, NoticeTemplate::ListingDenied);
    assert_eq!(sent[0].details["reason"], "Blurry photos");
}

#[test]
fn denial_of_published_listing_conflicts() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));

    let err = fx
        .service
        .deny(&fx.admin, &listing.id, None)
        .expect_err("not pending");
    assert!(matches!(err, MarketError::Conflict(_)));
    assert!(fx.fetch(&listing.id).is_some());
}

#[test]
fn favorites_update_listing_and_wishlist_once() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));

    fx.service
        .add_favorite(&fx.stranger, &listing.id)
        .expect("favorited");
    let again = fx
        .service
        .add_favorite(&fx.stranger, &listing.id)
        .expect("favorited twice");

    assert_eq!(again.favorites_count(), 1);
    assert_eq!(fx.user(&fx.stranger).wishlist.len(), 1);
    assert!(fx
        .service
        .is_favorite(&fx.stranger, &listing.id)
        .expect("status"));

    let removed = fx
        .service
        .remove_favorite(&fx.stranger, &listing.id)
        .expect("removed");
    assert_eq!(removed.favorites_count(), 0);
    assert!(fx.user(&fx.stranger).wishlist.is_empty());
    assert!(!fx
        .service
        .is_favorite(&fx.stranger, &listing.id)
        .expect("status"));
}

#[test]
fn deleting_a_listing_drops_it_from_wishlists() {
    let fx = fixture();
    let listing = fx.insert(published(fx.owner.id, 0));
    fx.service
        .add_favorite(&fx.stranger, &listing.id)
        .expect("favorited");
    assert_eq!(fx.user(&fx.stranger).wishlist.len(), 1);

    fx.service.delete(&fx.owner, &listing.id).expect("deleted");

    assert!(fx.user(&fx.stranger).wishlist.is_empty());
    let users = UserService::new(fx.store.clone(), fx.store.clone());
    assert!(users.wishlist(&fx.stranger).expect("wishlist").is_empty());
}

#[test]
fn denying_a_listing_drops_it_from_wishlists() {
    let fx = fixture();
    let listing = fx.pending();
    fx.service
        .add_favorite(&fx.stranger, &listing.id)
        .expect("favorited");

    fx.service.deny(&fx.admin, &listing.id, None).expect("denied");

    assert!(fx.user(&fx.stranger).wishlist.is_empty());
}

#[test]
fn wishlist_skips_listings_missing_from_the_store() {
    let fx = fixture();
    let kept = fx.insert(published(fx.owner.id, 0));
    let gone = fx.insert(published(fx.owner.id, 1));
    let users = UserService::new(fx.store.clone(), fx.store.clone());
    users
        .add_to_wishlist(&fx.stranger, &kept.id, None)
        .expect("kept added");
    users
        .add_to_wishlist(&fx.stranger, &gone.id, Some("  corner unit ".to_string()))
        .expect("gone added");
    assert_eq!(
        fx.user(&fx.stranger).wishlist[1].note.as_deref(),
        Some("corner unit")
    );

    // Bypass the service so the wishlist keeps a stale reference.
    ListingRepository::remove(fx.store.as_ref(), &gone.id).expect("removed");

    let items = users.wishlist(&fx.stranger).expect("wishlist");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].entry.listing, kept.id);
    assert_eq!(items[0].property["title"], json!(kept.title));
}

#[test]
fn favorite_on_missing_listing_is_not_found() {
    let fx = fixture();
    let err = fx
        .service
        .add_favorite(&fx.owner, &ListingId::new())
        .expect_err("missing listing");
    assert!(matches!(err, MarketError::NotFound { entity: "listing", .. }));
    assert!(fx.user(&fx.owner).wishlist.is_empty());
}

#[test]
fn repository_outages_propagate() {
    let fx = fixture();
    let service = ListingService::new(
        Arc::new(UnavailableListings),
        fx.store.clone(),
        fx.store.clone(),
        fx.notifier.clone(),
        fx.media.clone(),
    );

    let err = service
        .browse(&QueryParams::new())
        .expect_err("repository offline");
    assert!(matches!(
        err,
        MarketError::Repository(RepositoryError::Unavailable(_))
    ));
}
