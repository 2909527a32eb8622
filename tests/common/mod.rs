//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use specrepo::domain::{Entity, Metadata, SoftDelete};
use specrepo::infra::{MemoryStore, Store, UnitOfWork};
use specrepo::specification::{Collection, Reference};

pub const TEST_USER: &str = "tester";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCategory {
    pub id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub products: Vec<TestProduct>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl TestCategory {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.to_string(),
            products: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    pub fn products() -> Collection<TestCategory, TestProduct> {
        Collection::new(
            "products",
            |p: &TestProduct| p.category_id,
            |c: &mut TestCategory, products| c.products = products,
        )
    }
}

impl Entity for TestCategory {
    const TABLE_NAME: &'static str = "TestCategory";

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestProduct {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub category_id: Option<Uuid>,
    #[serde(skip)]
    pub category: Option<TestCategory>,
    #[serde(flatten)]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub deletion: SoftDelete,
}

impl TestProduct {
    pub fn new(name: &str, price: i64, category_id: Uuid) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.to_string(),
            price,
            category_id: Some(category_id),
            category: None,
            metadata: Metadata::default(),
            deletion: SoftDelete::default(),
        }
    }

    pub fn category() -> Reference<TestProduct, TestCategory> {
        Reference::new(
            "category",
            |p: &TestProduct| p.category_id,
            |p: &mut TestProduct, c| p.category = Some(c),
        )
    }
}

impl Entity for TestProduct {
    const TABLE_NAME: &'static str = "TestProduct";

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
    fn soft_delete(&self) -> Option<&SoftDelete> {
        Some(&self.deletion)
    }
    fn soft_delete_mut(&mut self) -> Option<&mut SoftDelete> {
        Some(&mut self.deletion)
    }
}

pub fn memory_store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

pub fn unit_of_work(store: &Arc<dyn Store>) -> UnitOfWork {
    UnitOfWork::new(Arc::clone(store), TEST_USER)
}
