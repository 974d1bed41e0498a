use pano_tour::domain::ports::TourStore;
use pano_tour::{JsonFileTourStore, Tour, TourError};
use tempfile::TempDir;

#[tokio::test]
async fn test_insert_and_find_one() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonFileTourStore::new(temp_dir.path().join("store"));

    assert!(store.find_one("demo").await.unwrap().is_none());
    assert!(!store.exists("demo").await.unwrap());

    let inserted = store
        .insert(Tour::new("demo", Vec::new(), Some("https://x.test/tours/demo/map.png".to_string())))
        .await
        .unwrap();
    assert_eq!(inserted.version, 1);

    let found = store.find_one("demo").await.unwrap().unwrap();
    assert_eq!(found, inserted);
    assert!(store.exists("demo").await.unwrap());

    let raw = std::fs::read_to_string(temp_dir.path().join("store").join("demo.json")).unwrap();
    assert!(raw.contains("\"mapPath\""));
    assert!(raw.contains("\"firstScene\""));
}

#[tokio::test]
async fn test_insert_rejects_existing_name() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonFileTourStore::new(temp_dir.path());

    store.insert(Tour::new("demo", Vec::new(), None)).await.unwrap();
    let result = store
        .insert(Tour::new("demo", Vec::new(), Some("map".to_string())))
        .await;
    assert!(matches!(result, Err(TourError::TourAlreadyExists(_))));
    assert!(store.find_one("demo").await.unwrap().unwrap().map_path.is_none());
}

#[tokio::test]
async fn test_save_find_all_and_delete() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonFileTourStore::new(temp_dir.path());
    assert!(store.find_all().await.unwrap().is_empty());

    let mut zoo = store.insert(Tour::new("zoo", Vec::new(), None)).await.unwrap();
    store.insert(Tour::new("art", Vec::new(), None)).await.unwrap();
    std::fs::write(temp_dir.path().join("notes.txt"), b"ignored").unwrap();

    zoo.group_name = Some("city".to_string());
    let zoo = store.save(zoo).await.unwrap();
    assert_eq!(zoo.version, 2);
    assert!(zoo.updated_at >= zoo.created_at);

    let names: Vec<String> = store
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .map(|tour| tour.name)
        .collect();
    assert_eq!(names, vec!["art", "zoo"]);

    let city = store.find_by_group_name_with_basic("city").await.unwrap();
    assert_eq!(city.len(), 1);
    assert_eq!(city[0].name, "zoo");
    assert_eq!(store.find_all_with_basic().await.unwrap().len(), 2);

    store.delete(&zoo).await.unwrap();
    assert!(!store.exists("zoo").await.unwrap());
    // deleting twice is fine
    store.delete(&zoo).await.unwrap();
}

#[tokio::test]
async fn test_names_outside_the_store_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let outside = temp_dir.path().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    let foreign = serde_json::to_vec(&Tour::new("victim", Vec::new(), None)).unwrap();
    std::fs::write(outside.join("victim.json"), foreign).unwrap();

    let store = JsonFileTourStore::new(temp_dir.path().join("store"));
    let escape = "../outside/victim";

    assert!(matches!(
        store.find_one(escape).await,
        Err(TourError::ValidationError { .. })
    ));
    assert!(matches!(
        store.exists(escape).await,
        Err(TourError::ValidationError { .. })
    ));
    assert!(matches!(
        store.insert(Tour::new(escape, Vec::new(), None)).await,
        Err(TourError::ValidationError { .. })
    ));
    assert!(matches!(
        store.delete(&Tour::new(escape, Vec::new(), None)).await,
        Err(TourError::ValidationError { .. })
    ));

    assert!(outside.join("victim.json").exists());
    assert!(store.find_all().await.unwrap().is_empty());
}
