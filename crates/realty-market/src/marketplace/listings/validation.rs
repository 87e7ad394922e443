use serde_json::Value;

use super::domain::{Category, CategoryTerms, Listing};
use crate::marketplace::validation::{ValidationErrors, Validator};

pub const MAX_PRICE: f64 = 100_000_000.0;
pub const MIN_AREA: f64 = 60.0;

/// Extension keys owned by each category.
pub const SALE_KEYS: [&str; 8] = [
    "deliveryDate",
    "deliveryTerms",
    "paymentMethod",
    "downPayment",
    "installmentPeriodInYears",
    "minInstallmentAmount",
    "ownershipType",
    "propertyStatus",
];
pub const RENT_KEYS: [&str; 5] = [
    "availableFrom",
    "leaseDuration",
    "deposit",
    "utilities",
    "rules",
];
pub const STUDENT_KEYS: [&str; 4] = ["availableFrom", "leaseDuration", "deposit", "utilities"];

fn allowed_keys(category: Category) -> &'static [&'static str] {
    match category {
        Category::Sale => &SALE_KEYS,
        Category::Rent => &RENT_KEYS,
        Category::Student => &STUDENT_KEYS,
    }
}

/// Reject extension keys that belong to another category, e.g. `downPayment`
/// on a rent listing.
pub fn check_category_keys(category: Category, body: &Value) -> Result<(), ValidationErrors> {
    let Some(map) = body.as_object() else {
        return Ok(());
    };
    let allowed = allowed_keys(category);
    let mut validator = Validator::new();

    for key in SALE_KEYS
        .iter()
        .chain(RENT_KEYS.iter())
        .filter(|key| map.contains_key(**key) && !allowed.contains(*key))
    {
        validator.reject(
            *key,
            format!("not applicable to {} listings", category.as_str()),
        );
    }

    validator.finish()
}

/// Field constraints checked on every create and update.
pub fn validate_listing(listing: &Listing) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();

    v.required("title", &listing.title);
    v.max_chars("title", &listing.title, 70);
    v.required("description", &listing.description);
    v.max_chars("description", &listing.description, 400);
    v.check(
        listing.price.is_finite() && (0.0..=MAX_PRICE).contains(&listing.price),
        "price",
        "must be between 0 and 100000000",
    );
    v.check(
        listing.area.is_finite() && listing.area >= MIN_AREA,
        "area",
        "must be at least 60",
    );
    v.range("bedrooms", listing.bedrooms, 0, 10);
    v.range("bathrooms", listing.bathrooms, 1, 10);
    if let Some(total) = listing.total_floors {
        v.at_least("totalFloors", total, 1);
    }

    v.required("location.address", &listing.location.address);
    if let Some(latitude) = listing.location.latitude {
        v.range("location.latitude", latitude, -90.0, 90.0);
    }
    if let Some(longitude) = listing.location.longitude {
        v.range("location.longitude", longitude, -180.0, 180.0);
    }

    for (index, image) in listing.images.iter().enumerate() {
        v.required(&format!("images[{index}].storageId"), &image.storage_id);
        v.required(&format!("images[{index}].url"), &image.url);
    }
    if !listing.images.is_empty() {
        let mains = listing.images.iter().filter(|image| image.is_main).count();
        v.check(mains == 1, "images", "exactly one image must be main");
    }

    v.required("contactInfo.name", &listing.contact_info.name);
    v.required("contactInfo.phone", &listing.contact_info.phone);

    let details = &listing.student_housing_details;
    v.range("studentHousingDetails.studentsPerRoom", details.students_per_room, 1, 4);
    if listing.is_student_friendly {
        v.check(
            details.is_enabled,
            "studentHousingDetails.isEnabled",
            "must be enabled for student-friendly listings",
        );
    }

    match &listing.terms {
        CategoryTerms::Sale(terms) => {
            if let Some(text) = &terms.delivery_terms {
                v.max_chars("deliveryTerms", text, 300);
            }
            if let Some(amount) = terms.down_payment {
                v.at_least("downPayment", amount, 0.0);
            }
            if let Some(years) = terms.installment_period_in_years {
                v.range("installmentPeriodInYears", years, 1, 30);
            }
            if let Some(amount) = terms.min_installment_amount {
                v.at_least("minInstallmentAmount", amount, 0.0);
            }
        }
        CategoryTerms::Rent(terms) => {
            lease_rules(&mut v, terms.lease_duration, terms.deposit);
            utilities_rules(&mut v, &terms.utilities);
            if let Some(other) = &terms.rules.other {
                v.max_chars("rules.other", other, 300);
            }
        }
        CategoryTerms::Student(terms) => {
            lease_rules(&mut v, terms.lease_duration, terms.deposit);
            utilities_rules(&mut v, &terms.utilities);
        }
    }

    v.finish()
}

fn lease_rules(v: &mut Validator, lease_duration: Option<u16>, deposit: Option<f64>) {
    if let Some(months) = lease_duration {
        v.range("leaseDuration", months, 1, 120);
    }
    if let Some(deposit) = deposit {
        v.at_least("deposit", deposit, 0.0);
    }
}

fn utilities_rules(v: &mut Validator, utilities: &super::domain::Utilities) {
    if let Some(cost) = utilities.cost {
        v.at_least("utilities.cost", cost, 0.0);
    }
    if let Some(details) = &utilities.details {
        v.max_chars("utilities.details", details, 200);
    }
}
