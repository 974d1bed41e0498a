use crate::domain::model::Tour;
use crate::domain::ports::TourStore;
use crate::utils::error::{Result, TourError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-process store, mainly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTourStore {
    tours: Arc<Mutex<HashMap<String, Tour>>>,
}

impl MemoryTourStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tours.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tours.lock().await.is_empty()
    }
}

fn sorted(mut tours: Vec<Tour>) -> Vec<Tour> {
    tours.sort_by(|a, b| a.name.cmp(&b.name));
    tours
}

#[async_trait]
impl TourStore for MemoryTourStore {
    async fn find_one(&self, name: &str) -> Result<Option<Tour>> {
        Ok(self.tours.lock().await.get(name).cloned())
    }

    async fn insert(&self, mut tour: Tour) -> Result<Tour> {
        let mut tours = self.tours.lock().await;
        if tours.contains_key(&tour.name) {
            return Err(TourError::TourAlreadyExists(tour.name));
        }
        tour.touch();
        tours.insert(tour.name.clone(), tour.clone());
        Ok(tour)
    }

    async fn save(&self, mut tour: Tour) -> Result<Tour> {
        tour.touch();
        self.tours
            .lock()
            .await
            .insert(tour.name.clone(), tour.clone());
        Ok(tour)
    }

    async fn delete(&self, tour: &Tour) -> Result<()> {
        self.tours.lock().await.remove(&tour.name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.tours.lock().await.contains_key(name))
    }

    async fn find_all(&self) -> Result<Vec<Tour>> {
        Ok(sorted(self.tours.lock().await.values().cloned().collect()))
    }

    async fn find_all_with_basic(&self) -> Result<Vec<Tour>> {
        Ok(sorted(
            self.tours.lock().await.values().map(Tour::basic).collect(),
        ))
    }

    async fn find_by_group_name_with_basic(&self, group_name: &str) -> Result<Vec<Tour>> {
        Ok(sorted(
            self.tours
                .lock()
                .await
                .values()
                .filter(|tour| tour.group_name.as_deref() == Some(group_name))
                .map(Tour::basic)
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_conflict_keeps_original() {
        let store = MemoryTourStore::new();
        let first = store.insert(Tour::new("demo", Vec::new(), None)).await.unwrap();
        assert_eq!(first.version, 1);

        let second = Tour::new("demo", Vec::new(), Some("map.png".to_string()));
        assert!(matches!(
            store.insert(second).await,
            Err(TourError::TourAlreadyExists(name)) if name == "demo"
        ));
        assert_eq!(store.find_one("demo").await.unwrap().unwrap().map_path, None);
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_group_filter() {
        let store = MemoryTourStore::new();
        let mut tour = store.insert(Tour::new("b", Vec::new(), None)).await.unwrap();
        tour.group_name = Some("campus".to_string());
        let saved = store.save(tour).await.unwrap();
        assert_eq!(saved.version, 2);

        store.insert(Tour::new("a", Vec::new(), None)).await.unwrap();
        let names: Vec<String> = store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let campus = store.find_by_group_name_with_basic("campus").await.unwrap();
        assert_eq!(campus.len(), 1);
        assert_eq!(campus[0].name, "b");

        store.delete(&saved).await.unwrap();
        assert!(!store.exists("b").await.unwrap());
    }
}
