//! Data-access traits and the in-memory store.
//!
//! Handlers only see these traits; the binary picks [`InMemoryStore`] or,
//! with the `postgres` feature and a `DATABASE_URL`, the PostgreSQL store
//! in [`crate::postgres`].
//!
//! # Contract
//!
//! - `Ok(None)` / `Ok(false)` mean "not found", never an error.
//! - Lists are ordered (products by name, users by email, ties by id) so
//!   that a page is stable between two requests with no writes in between.
//! - A mutation is visible to every reader once the method returns.
//! - Unique violations (email, product reference, customer name) return
//!   `Error::Conflict`.

use crate::error::{Error, Result};
use crate::models::{Customer, NewCustomer, NewProduct, NewUser, Product, User};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

pub trait ProductRepository: Send + Sync + 'static {
    fn find_product(&self, id: i64) -> impl Future<Output = Result<Option<Product>>> + Send;

    /// Products ordered by name, skipping `offset`, at most `limit`.
    fn find_products(
        &self,
        offset: u64,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Product>>> + Send;

    fn count_products(&self) -> impl Future<Output = Result<u64>> + Send;

    fn save_product(&self, product: NewProduct) -> impl Future<Output = Result<Product>> + Send;
}

pub trait CustomerRepository: Send + Sync + 'static {
    fn find_customer(&self, id: i64) -> impl Future<Output = Result<Option<Customer>>> + Send;

    fn save_customer(
        &self,
        customer: NewCustomer,
    ) -> impl Future<Output = Result<Customer>> + Send;
}

pub trait UserRepository: Send + Sync + 'static {
    fn find_user(&self, id: i64) -> impl Future<Output = Result<Option<User>>> + Send;

    fn find_user_by_email(&self, email: &str)
        -> impl Future<Output = Result<Option<User>>> + Send;

    /// Users of one customer ordered by email, skipping `offset`, at most
    /// `limit`.
    fn find_users_by_customer(
        &self,
        customer_id: i64,
        offset: u64,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<User>>> + Send;

    fn count_users_by_customer(&self, customer_id: i64)
        -> impl Future<Output = Result<u64>> + Send;

    /// Insert a user; `Error::Conflict` when the email is taken.
    fn save_user(&self, user: NewUser) -> impl Future<Output = Result<User>> + Send;

    /// Delete a user; `false` when it did not exist.
    fn remove_user(&self, id: i64) -> impl Future<Output = Result<bool>> + Send;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: ProductRepository + CustomerRepository + UserRepository + Clone {}

impl<T> Store for T where T: ProductRepository + CustomerRepository + UserRepository + Clone {}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
struct Tables {
    customers: BTreeMap<i64, Customer>,
    users: BTreeMap<i64, User>,
    products: BTreeMap<i64, Product>,
    next_customer_id: i64,
    next_user_id: i64,
    next_product_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

fn window<T>(items: Vec<T>, offset: u64, limit: u32) -> Vec<T> {
    let skip = usize::try_from(offset).unwrap_or(usize::MAX);
    items.into_iter().skip(skip).take(limit as usize).collect()
}

/// Process-local store with auto-increment ids and unique constraints.
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductRepository for InMemoryStore {
    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn find_products(&self, offset: u64, limit: u32) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(window(products, offset, limit))
    }

    async fn count_products(&self) -> Result<u64> {
        Ok(self.tables.read().await.products.len() as u64)
    }

    async fn save_product(&self, product: NewProduct) -> Result<Product> {
        let mut tables = self.tables.write().await;
        if tables
            .products
            .values()
            .any(|p| p.reference == product.reference)
        {
            return Err(Error::Conflict(format!(
                "product reference {} already exists",
                product.reference
            )));
        }

        let id = next_id(&mut tables.next_product_id);
        let saved = Product {
            id,
            name: product.name,
            reference: product.reference,
            price: product.price,
            brand: product.brand,
            model: product.model,
            description: product.description,
        };
        tables.products.insert(id, saved.clone());
        Ok(saved)
    }
}

impl CustomerRepository for InMemoryStore {
    async fn find_customer(&self, id: i64) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(&id).cloned())
    }

    async fn save_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let mut tables = self.tables.write().await;
        if tables.customers.values().any(|c| c.name == customer.name) {
            return Err(Error::Conflict(format!(
                "customer {} already exists",
                customer.name
            )));
        }

        let id = next_id(&mut tables.next_customer_id);
        let saved = Customer {
            id,
            name: customer.name,
        };
        tables.customers.insert(id, saved.clone());
        Ok(saved)
    }
}

impl UserRepository for InMemoryStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users_by_customer(
        &self,
        customer_id: i64,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.customer_id == Some(customer_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email).then(a.id.cmp(&b.id)));
        Ok(window(users, offset, limit))
    }

    async fn count_users_by_customer(&self, customer_id: i64) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.customer_id == Some(customer_id))
            .count() as u64)
    }

    async fn save_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(Error::Conflict(format!("email {} already exists", user.email)));
        }
        if let Some(cid) = user.customer_id {
            if !tables.customers.contains_key(&cid) {
                return Err(Error::RepositoryError(format!(
                    "customer {} does not exist",
                    cid
                )));
            }
        }

        let id = next_id(&mut tables.next_user_id);
        let saved = User {
            id,
            email: user.email,
            roles: user.roles,
            password_hash: user.password_hash,
            customer_id: user.customer_id,
        };
        tables.users.insert(id, saved.clone());
        Ok(saved)
    }

    async fn remove_user(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.users.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROLE_USER;

    fn new_user(email: &str, customer_id: Option<i64>) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            roles: vec![ROLE_USER.to_string()],
            customer_id,
        }
    }

    fn new_product(name: &str, reference: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            reference: reference.to_string(),
            price: Some(100),
            brand: None,
            model: None,
            description: None,
        }
    }

    async fn customer(store: &InMemoryStore, name: &str) -> Customer {
        store
            .save_customer(NewCustomer {
                name: name.to_string(),
            })
            .await
            .expect("Failed to save customer")
    }

    #[tokio::test]
    async fn test_ids_auto_increment() {
        let store = InMemoryStore::new();
        let a = customer(&store, "Acme").await;
        let b = customer(&store, "Globex").await;
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(
            store.find_customer(2).await.expect("Failed to find"),
            Some(b)
        );
        assert_eq!(store.find_customer(3).await.expect("Failed to find"), None);
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let store = InMemoryStore::new();
        let acme = customer(&store, "Acme").await;

        let duplicate = store
            .save_customer(NewCustomer {
                name: "Acme".to_string(),
            })
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));

        store
            .save_user(new_user("a@acme.test", Some(acme.id)))
            .await
            .expect("Failed to save user");
        let duplicate = store
            .save_user(new_user("a@acme.test", Some(acme.id)))
            .await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));

        store
            .save_product(new_product("Phone", "REF-1"))
            .await
            .expect("Failed to save product");
        let duplicate = store.save_product(new_product("Other", "REF-1")).await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_products_page_ordered_by_name() {
        let store = InMemoryStore::new();
        for (name, reference) in [("Charlie", "c"), ("Alpha", "a"), ("Bravo", "b")] {
            store
                .save_product(new_product(name, reference))
                .await
                .expect("Failed to save product");
        }

        let page = store.find_products(1, 5).await.expect("Failed to page");
        let names: Vec<&str> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bravo", "Charlie"]);
        assert_eq!(store.count_products().await.expect("Failed to count"), 3);
        assert!(store
            .find_products(10, 5)
            .await
            .expect("Failed to page")
            .is_empty());
    }

    #[tokio::test]
    async fn test_users_scoped_to_customer() {
        let store = InMemoryStore::new();
        let acme = customer(&store, "Acme").await;
        let globex = customer(&store, "Globex").await;

        for email in ["c@acme.test", "a@acme.test", "b@acme.test"] {
            store
                .save_user(new_user(email, Some(acme.id)))
                .await
                .expect("Failed to save user");
        }
        store
            .save_user(new_user("x@globex.test", Some(globex.id)))
            .await
            .expect("Failed to save user");

        let page = store
            .find_users_by_customer(acme.id, 0, 2)
            .await
            .expect("Failed to page");
        let emails: Vec<&str> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a@acme.test", "b@acme.test"]);
        assert_eq!(
            store
                .count_users_by_customer(acme.id)
                .await
                .expect("Failed to count"),
            3
        );
        assert_eq!(
            store
                .count_users_by_customer(globex.id)
                .await
                .expect("Failed to count"),
            1
        );
    }

    #[tokio::test]
    async fn test_save_user_requires_existing_customer() {
        let store = InMemoryStore::new();
        let result = store.save_user(new_user("a@nowhere.test", Some(99))).await;
        assert!(matches!(result, Err(Error::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_remove_user() {
        let store = InMemoryStore::new();
        let acme = customer(&store, "Acme").await;
        let user = store
            .save_user(new_user("a@acme.test", Some(acme.id)))
            .await
            .expect("Failed to save user");

        assert!(store.remove_user(user.id).await.expect("Failed to remove"));
        assert!(!store.remove_user(user.id).await.expect("Failed to remove"));
        assert_eq!(store.find_user(user.id).await.expect("Failed to find"), None);
        assert_eq!(
            store
                .find_user_by_email("a@acme.test")
                .await
                .expect("Failed to find"),
            None
        );
    }

    #[tokio::test]
    async fn test_clones_share_tables() {
        let store = InMemoryStore::new();
        let clone = store.clone();
        customer(&store, "Acme").await;
        assert!(clone
            .find_customer(1)
            .await
            .expect("Failed to find")
            .is_some());
    }
}
