use crate::infra::in_memory_services;
use clap::Args;
use realty_market::config::AppConfig;
use realty_market::error::{AppError, MarketError};
use realty_market::marketplace::actor::{Actor, Role};
use realty_market::marketplace::agencies::{AgencyDraft, LogoDescriptor};
use realty_market::marketplace::contact::ContactDraft;
use realty_market::marketplace::ids::AgencyId;
use realty_market::marketplace::inquiries::InquiryDraft;
use realty_market::marketplace::listings::{
    Amenity, Category, CategoryTerms, City, ContactInfo, ImageDescriptor, ListingDraft, Location,
    PropertyType, RentTerms, SaleTerms, StudentHousingDetails, StudentTerms,
};
use realty_market::marketplace::query::QueryParams;
use realty_market::marketplace::testimonials::{TestimonialDraft, TestimonialKind};
use realty_market::marketplace::users::User;
use realty_market::marketplace::MarketplaceServices;
use serde_json::json;

#[derive(Args, Debug, Default)]
pub(crate) struct QueryArgs {
    /// Query parameter as key=value, e.g. `price[gte]=500000`. Repeatable.
    #[arg(long = "param", short = 'p', value_parser = parse_pair)]
    pub(crate) params: Vec<(String, String)>,
    /// Only approved, active listings (the public search feed)
    #[arg(long)]
    pub(crate) public: bool,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

pub(crate) fn run_query(args: QueryArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let services = in_memory_services(config.query.page_defaults());
    let summary = seed(&services)?;

    let params = QueryParams::from_pairs(args.params);
    let page = if args.public {
        services.listings.search(&params)?
    } else {
        services.listings.browse(&params)?
    };

    println!(
        "Demo catalogue: {} listings ({} pending review) across {} agencies",
        summary.listings, summary.pending, summary.agencies
    );
    println!(
        "Page {} of {} ({} matching)",
        page.pagination.current_page, page.pagination.total_pages, page.pagination.total_docs
    );

    let payload = json!({ "data": page.data, "pagination": page.pagination });
    let rendered = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    println!("{rendered}");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeedSummary {
    pub(crate) users: usize,
    pub(crate) agencies: usize,
    pub(crate) listings: usize,
    pub(crate) pending: usize,
}

struct Sample {
    title: &'static str,
    description: &'static str,
    property_type: PropertyType,
    city: City,
    category: Category,
    price: f64,
    area: f64,
    bedrooms: u8,
    amenities: &'static [Amenity],
    /// Submitted by a regular user and left in the moderation queue.
    pending: bool,
}

const SAMPLES: [Sample; 8] = [
    Sample {
        title: "شقة فاخرة بشبين الكوم",
        description: "شقة واسعة في الدور الثالث قريبة من الجامعة والخدمات.",
        property_type: PropertyType::Apartment,
        city: City::ShebinElKom,
        category: Category::Sale,
        price: 1_450_000.0,
        area: 140.0,
        bedrooms: 3,
        amenities: &[Amenity::Elevator, Amenity::Balcony],
        pending: false,
    },
    Sample {
        title: "Garden villa in Tanta",
        description: "فيلا مستقلة بحديقة خاصة وموقف سيارات.",
        property_type: PropertyType::Villa,
        city: City::Tanta,
        category: Category::Sale,
        price: 6_200_000.0,
        area: 380.0,
        bedrooms: 5,
        amenities: &[Amenity::Parking, Amenity::Security],
        pending: false,
    },
    Sample {
        title: "Family flat for rent in Menouf",
        description: "Bright flat near the main square, equipped kitchen.",
        property_type: PropertyType::Apartment,
        city: City::Menouf,
        category: Category::Rent,
        price: 4_500.0,
        area: 120.0,
        bedrooms: 3,
        amenities: &[Amenity::EquippedKitchen, Amenity::AirConditioning],
        pending: false,
    },
    Sample {
        title: "Duplex with roof terrace",
        description: "Two-level duplex with a private roof terrace.",
        property_type: PropertyType::Duplex,
        city: City::ShebinElKom,
        category: Category::Rent,
        price: 7_000.0,
        area: 210.0,
        bedrooms: 4,
        amenities: &[Amenity::Balcony, Amenity::Storage],
        pending: false,
    },
    Sample {
        title: "Student rooms near Menoufia University",
        description: "Shared rooms a short walk from the faculty of engineering.",
        property_type: PropertyType::Apartment,
        city: City::ShebinElKom,
        category: Category::Student,
        price: 1_200.0,
        area: 100.0,
        bedrooms: 3,
        amenities: &[Amenity::SmartElectricity],
        pending: false,
    },
    Sample {
        title: "Corner shop on the main road",
        description: "Street-facing shop suitable for retail or a pharmacy.",
        property_type: PropertyType::Shop,
        city: City::Quesna,
        category: Category::Sale,
        price: 900_000.0,
        area: 65.0,
        bedrooms: 0,
        amenities: &[],
        pending: false,
    },
    Sample {
        title: "Studio for students in Tanta",
        description: "Furnished studio for one student, utilities included.",
        property_type: PropertyType::Studio,
        city: City::Tanta,
        category: Category::Student,
        price: 1_800.0,
        area: 60.0,
        bedrooms: 1,
        amenities: &[Amenity::PartlyFurnished],
        pending: true,
    },
    Sample {
        title: "Apartment awaiting review in Ashmoun",
        description: "Second floor apartment, installment plan available.",
        property_type: PropertyType::Apartment,
        city: City::Ashmoun,
        category: Category::Sale,
        price: 1_100_000.0,
        area: 115.0,
        bedrooms: 2,
        amenities: &[Amenity::Balcony],
        pending: true,
    },
];

impl Sample {
    fn terms(&self) -> CategoryTerms {
        match self.category {
            Category::Sale => CategoryTerms::Sale(SaleTerms::default()),
            Category::Rent => CategoryTerms::Rent(RentTerms {
                lease_duration: Some(12),
                deposit: Some(self.price * 2.0),
                ..RentTerms::default()
            }),
            Category::Student => CategoryTerms::Student(StudentTerms {
                lease_duration: Some(9),
                ..StudentTerms::default()
            }),
        }
    }

    fn draft(&self, index: usize, agency: Option<AgencyId>) -> ListingDraft {
        ListingDraft {
            title: self.title.to_string(),
            description: self.description.to_string(),
            property_type: self.property_type,
            price: self.price,
            area: self.area,
            bedrooms: self.bedrooms,
            bathrooms: 1 + self.bedrooms / 2,
            floor: None,
            total_floors: None,
            location: Location {
                address: format!("{} Gomhoria St", 10 + index),
                city: self.city,
                district: None,
                latitude: None,
                longitude: None,
            },
            images: ["front", "inside"]
                .iter()
                .map(|view| {
                    ImageDescriptor::new(
                        format!("seed-{index}-{view}"),
                        format!("https://media.saknly.example/seed/{index}/{view}.jpg"),
                    )
                })
                .collect(),
            amenities: self.amenities.to_vec(),
            agent: None,
            agency,
            contact_info: ContactInfo {
                name: "Saknly Desk".to_string(),
                phone: "+20 48 222 1234".to_string(),
                email: Some("desk@saknly.example".to_string()),
                whatsapp: None,
            },
            is_active: true,
            is_negotiable: index % 2 == 0,
            is_student_friendly: false,
            student_housing_details: StudentHousingDetails::default(),
            terms: self.terms(),
        }
    }
}

fn register(
    services: &MarketplaceServices,
    name: &str,
    role: Role,
) -> Result<Actor, MarketError> {
    let mut user = User::new(name, format!("{name}@saknly.example"), role);
    user.password_hash = Some("$argon2id$v=19$demo-account".to_string());
    user.is_confirmed = true;
    let user = services.users.register(user)?;
    Ok(Actor::new(user.id, user.role))
}

fn agency(name: &str, slug: &str, featured: bool) -> AgencyDraft {
    AgencyDraft {
        name: name.to_string(),
        logo: LogoDescriptor {
            storage_id: format!("logo-{slug}"),
            url: format!("https://media.saknly.example/logos/{slug}.png"),
        },
        description: None,
        is_featured: featured,
    }
}

/// Demo catalogue: three accounts, two agencies, eight listings (two of them
/// pending review), one inquiry, one agency testimonial and one contact
/// message.
pub(crate) fn seed(services: &MarketplaceServices) -> Result<SeedSummary, MarketError> {
    let admin = register(services, "saknly_admin", Role::Admin)?;
    let agent = register(services, "delta_agent", Role::Agent)?;
    let owner = register(services, "home_owner", Role::User)?;

    let agencies = [
        services
            .agencies
            .create(&admin, agency("Nile Homes", "nile-homes", true))?,
        services
            .agencies
            .create(&admin, agency("Delta Realty", "delta-realty", false))?,
    ];

    let mut listings = Vec::with_capacity(SAMPLES.len());
    for (index, sample) in SAMPLES.iter().enumerate() {
        let (actor, agency) = if sample.pending {
            (&owner, None)
        } else {
            (&agent, Some(agencies[index % agencies.len()].id))
        };
        listings.push(services.listings.create(actor, sample.draft(index, agency))?);
    }
    let pending = listings.iter().filter(|listing| !listing.is_approved).count();

    if let Some(first) = listings.iter().find(|listing| listing.is_approved) {
        services.inquiries.submit(InquiryDraft {
            listing: first.id,
            name: "Mona Adel".to_string(),
            email: "mona@example.com".to_string(),
            phone: "+20 10 5555 0101".to_string(),
            message: "Is the apartment still available for a viewing this week?".to_string(),
        })?;
    }

    services.testimonials.submit(TestimonialDraft {
        name: "Karim Said".to_string(),
        text: "Found our flat in two days through Nile Homes.".to_string(),
        kind: Some(TestimonialKind::Agency),
        agency_id: Some(agencies[0].id),
        ..TestimonialDraft::default()
    })?;

    services.contacts.submit(ContactDraft {
        name: "Hany Mostafa".to_string(),
        email: "hany@example.com".to_string(),
        subject: "Listing my villa".to_string(),
        message: "How long does the review of a new listing usually take?".to_string(),
    })?;

    Ok(SeedSummary {
        users: 3,
        agencies: agencies.len(),
        listings: listings.len(),
        pending,
    })
}
