//! Demo data loaded at startup when `SEED_FIXTURES` is on.
//!
//! 16 customers with 4 users each, one administrator without a customer,
//! and 12 products. Every account uses the password [`FIXTURE_PASSWORD`].

use crate::error::Result;
use crate::models::{NewCustomer, NewProduct, NewUser, ROLE_ADMIN, ROLE_USER};
use crate::repository::Store;
use uuid::Uuid;

pub const FIXTURE_PASSWORD: &str = "password";
pub const ADMIN_EMAIL: &str = "admin@catalog.test";

pub const CUSTOMER_COUNT: usize = 16;
pub const USERS_PER_CUSTOMER: usize = 4;
pub const PRODUCT_COUNT: usize = 12;

const COMPANY_WORDS: [&str; 8] = [
    "Atlas", "Boreal", "Cobalt", "Delta", "Ember", "Fjord", "Granite", "Harbor",
];
const COMPANY_SUFFIXES: [&str; 2] = ["Mobile", "Telecom"];
const PRODUCT_WORDS: [&str; 12] = [
    "Aurora", "Breeze", "Comet", "Drift", "Echo", "Flare", "Glide", "Halo", "Ion", "Jade",
    "Kite", "Lumen",
];
const MODELS: [&str; 4] = ["Lite", "Plus", "Pro", "Max"];

/// A fixture user, attached to a customer by its position in
/// [`Fixtures::customers`].
#[derive(Clone, Debug)]
pub struct FixtureUser {
    pub customer: Option<usize>,
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Fixtures {
    pub customers: Vec<NewCustomer>,
    pub users: Vec<FixtureUser>,
    pub products: Vec<NewProduct>,
    password_hash: String,
}

/// Counts of what [`seed`] inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub customers: usize,
    pub users: usize,
    pub products: usize,
}

fn slug(name: &str) -> String {
    name.to_ascii_lowercase().replace(' ', "-")
}

impl Fixtures {
    /// Build the data set; `password_hash` is the stored hash of
    /// [`FIXTURE_PASSWORD`], shared by every account.
    pub fn generate(password_hash: impl Into<String>) -> Self {
        let customers: Vec<NewCustomer> = (0..CUSTOMER_COUNT)
            .map(|i| NewCustomer {
                name: format!(
                    "{} {}",
                    COMPANY_WORDS[i % COMPANY_WORDS.len()],
                    COMPANY_SUFFIXES[i / COMPANY_WORDS.len() % COMPANY_SUFFIXES.len()]
                ),
            })
            .collect();

        let mut users = Vec::with_capacity(CUSTOMER_COUNT * USERS_PER_CUSTOMER + 1);
        for (index, customer) in customers.iter().enumerate() {
            let domain = slug(&customer.name);
            for n in 1..=USERS_PER_CUSTOMER {
                users.push(FixtureUser {
                    customer: Some(index),
                    email: format!("user{}@{}.test", n, domain),
                    roles: vec![ROLE_USER.to_string()],
                });
            }
        }
        users.push(FixtureUser {
            customer: None,
            email: ADMIN_EMAIL.to_string(),
            roles: vec![ROLE_ADMIN.to_string()],
        });

        let products = (0..PRODUCT_COUNT)
            .map(|i| {
                let brand = COMPANY_WORDS[(i * 3) % COMPANY_WORDS.len()];
                let model = MODELS[i % MODELS.len()];
                NewProduct {
                    name: format!("{} {}", PRODUCT_WORDS[i], model),
                    reference: Uuid::now_v7().to_string(),
                    price: Some(100 + ((i as i64 * 137) % 900)),
                    brand: Some(brand.to_string()),
                    model: Some(model.to_string()),
                    description: Some(format!(
                        "The {} {} smartphone by {}.",
                        PRODUCT_WORDS[i], model, brand
                    )),
                }
            })
            .collect();

        Fixtures {
            customers,
            users,
            products,
            password_hash: password_hash.into(),
        }
    }
}

/// Insert `fixtures` into `store`.
pub async fn seed<S: Store>(store: &S, fixtures: Fixtures) -> Result<SeedReport> {
    let mut customer_ids = Vec::with_capacity(fixtures.customers.len());
    for customer in fixtures.customers {
        customer_ids.push(store.save_customer(customer).await?.id);
    }

    let mut users = 0;
    for user in fixtures.users {
        let customer_id = user
            .customer
            .and_then(|index| customer_ids.get(index).copied());
        store
            .save_user(NewUser {
                email: user.email,
                password_hash: fixtures.password_hash.clone(),
                roles: user.roles,
                customer_id,
            })
            .await?;
        users += 1;
    }

    let mut products = 0;
    for product in fixtures.products {
        store.save_product(product).await?;
        products += 1;
    }

    let report = SeedReport {
        customers: customer_ids.len(),
        users,
        products,
    };
    info!(
        "✓ Fixtures loaded: {} customers, {} users, {} products",
        report.customers, report.users, report.products
    );
    Ok(report)
}
