use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use sitedesk::client::ApiError;
use sitedesk::cms::{Collection, Product, Repository};
use tokio::sync::oneshot;

fn product(id: Option<&str>, name: &str) -> Product {
    let mut value = json!({ "name": name });
    if let Some(id) = id {
        value["id"] = json!(id);
    }
    serde_json::from_value(value).unwrap()
}

fn names(items: &[Product]) -> Vec<String> {
    items.iter().map(|p| p.name.clone()).collect()
}

/// Each `list` call waits for the test to release it with a result.
#[derive(Default)]
struct GatedRepo {
    gates: Mutex<VecDeque<oneshot::Receiver<Result<Vec<Product>, ApiError>>>>,
}

impl GatedRepo {
    fn gate(&self) -> oneshot::Sender<Result<Vec<Product>, ApiError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl Repository<Product> for GatedRepo {
    async fn list(&self) -> Result<Vec<Product>, ApiError> {
        let gate = self.gates.lock().unwrap().pop_front().unwrap();
        gate.await.unwrap()
    }

    async fn get(&self, _id: &str) -> Result<Product, ApiError> {
        unimplemented!()
    }

    async fn create(&self, _item: &Product) -> Result<Vec<Product>, ApiError> {
        self.list().await
    }

    async fn update(&self, _id: &str, _item: &Product) -> Result<Vec<Product>, ApiError> {
        self.list().await
    }

    async fn delete(&self, _id: &str) -> Result<Vec<Product>, ApiError> {
        self.list().await
    }
}

/// In-memory store that behaves like the backend.
#[derive(Default)]
struct MemoryRepo {
    items: Mutex<Vec<Product>>,
    next_id: Mutex<u32>,
}

#[async_trait]
impl Repository<Product> for MemoryRepo {
    async fn list(&self) -> Result<Vec<Product>, ApiError> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn get(&self, id: &str) -> Result<Product, ApiError> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "Record not found".to_string(),
            })
    }

    async fn create(&self, item: &Product) -> Result<Vec<Product>, ApiError> {
        {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let mut stored = item.clone();
            stored.id = Some(format!("p{next}"));
            self.items.lock().unwrap().push(stored);
        }
        self.list().await
    }

    async fn update(&self, id: &str, item: &Product) -> Result<Vec<Product>, ApiError> {
        {
            let mut items = self.items.lock().unwrap();
            let slot = items.iter_mut().find(|p| p.id.as_deref() == Some(id)).ok_or(ApiError::Status {
                status: 404,
                message: "Record not found".to_string(),
            })?;
            *slot = item.clone();
        }
        self.list().await
    }

    async fn delete(&self, id: &str) -> Result<Vec<Product>, ApiError> {
        self.items.lock().unwrap().retain(|p| p.id.as_deref() != Some(id));
        self.list().await
    }
}

#[tokio::test]
async fn slow_response_does_not_overwrite_fresher_data() {
    let repo = Arc::new(GatedRepo::default());
    let slow = repo.gate();
    let fast = repo.gate();
    let screen = Collection::new(repo.clone() as Arc<dyn Repository<Product>>);

    let first = tokio::spawn({
        let screen = screen.clone();
        async move { screen.refresh().await }
    });
    tokio::task::yield_now().await;
    let second = tokio::spawn({
        let screen = screen.clone();
        async move { screen.refresh().await }
    });
    tokio::task::yield_now().await;

    fast.send(Ok(vec![product(Some("1"), "Fresh")])).unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(names(&screen.items()), vec!["Fresh"]);
    assert!(screen.snapshot().loading);

    slow.send(Ok(vec![product(Some("1"), "Stale")])).unwrap();
    first.await.unwrap().unwrap();

    let state = screen.snapshot();
    assert_eq!(names(&state.items), vec!["Fresh"]);
    assert!(!state.loading);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn failed_refresh_keeps_items_and_reports_the_error() {
    let repo = Arc::new(GatedRepo::default());
    let ok = repo.gate();
    let broken = repo.gate();
    let screen = Collection::new(repo.clone() as Arc<dyn Repository<Product>>);

    ok.send(Ok(vec![product(Some("1"), "Hosting")])).unwrap();
    screen.refresh().await.unwrap();

    broken.send(Err(ApiError::Timeout)).unwrap();
    assert_eq!(screen.refresh().await, Err(ApiError::Timeout));

    let state = screen.snapshot();
    assert_eq!(names(&state.items), vec!["Hosting"]);
    assert_eq!(state.error.as_deref(), Some("Request timed out"));
}

#[tokio::test]
async fn mutations_resync_from_the_returned_list() {
    let repo = Arc::new(MemoryRepo::default());
    let screen = Collection::new(repo.clone() as Arc<dyn Repository<Product>>);

    screen.save(&product(None, "Starter site")).await.unwrap();
    screen.save(&product(None, "SEO audit")).await.unwrap();
    assert_eq!(names(&screen.items()), vec!["Starter site", "SEO audit"]);

    let mut renamed = screen.items()[1].clone();
    renamed.name = "Technical SEO audit".to_string();
    screen.save(&renamed).await.unwrap();
    assert_eq!(names(&screen.items()), vec!["Starter site", "Technical SEO audit"]);

    screen.remove("p1").await.unwrap();
    assert_eq!(names(&screen.items()), vec!["Technical SEO audit"]);

    let err = screen.save(&product(Some("missing"), "Ghost")).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 404, .. }));
    assert_eq!(names(&screen.items()), vec!["Technical SEO audit"]);
    assert!(screen.snapshot().error.is_some());
}
