use crate::{
    config::CoreConfig,
    domain::{Board, Card, EntityId, List},
    error::Result,
    storage::{tables::Tables, BoardUpdate, CardUpdate, ListUpdate, Persistence},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

/// File-based storage implementation
///
/// All boards live in one JSON document. Each call reads it, applies the
/// change and writes it back while holding a lock, so concurrent calls from
/// the same process never interleave.
pub struct FileStorage {
    root_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    const MARTRELLO_DIR: &'static str = ".martrello";
    const STATE_FILE: &'static str = "state.json";
    const CONFIG_FILE: &'static str = "config.toml";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::MARTRELLO_DIR),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage rooted at the configured data directory
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            root_path: config.data_dir.clone(),
            write_lock: Mutex::new(()),
        }
    }

    fn state_file(&self) -> PathBuf {
        self.root_path.join(Self::STATE_FILE)
    }

    fn config_file(&self) -> PathBuf {
        self.root_path.join(Self::CONFIG_FILE)
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    /// Creates the data directory and an empty state document
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        if !self.state_file().exists() {
            self.save_tables(&Tables::default()).await?;
        }
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.state_file().exists()
    }

    /// Reads `config.toml` next to the state, falling back to defaults
    pub async fn load_config(&self) -> Result<CoreConfig> {
        let config_file = self.config_file();
        if !config_file.exists() {
            return Ok(CoreConfig::default());
        }
        CoreConfig::load(&config_file).await
    }

    async fn load_tables(&self) -> Result<Tables> {
        let state_file = self.state_file();
        if !state_file.exists() {
            return Ok(Tables::default());
        }

        let contents = fs::read_to_string(&state_file).await?;
        let tables: Tables = serde_json::from_str(&contents)?;
        Ok(tables)
    }

    async fn save_tables(&self, tables: &Tables) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        let json = serde_json::to_string_pretty(tables)?;
        fs::write(self.state_file(), json).await?;
        Ok(())
    }

    async fn read<R>(&self, f: impl FnOnce(&Tables) -> R + Send) -> Result<R> {
        let _guard = self.write_lock.lock().await;
        let tables = self.load_tables().await?;
        Ok(f(&tables))
    }

    async fn write<R: Send>(&self, f: impl FnOnce(&mut Tables) -> Result<R> + Send) -> Result<R> {
        let _guard = self.write_lock.lock().await;
        let mut tables = self.load_tables().await?;
        let result = f(&mut tables)?;
        self.save_tables(&tables).await?;
        Ok(result)
    }
}

#[async_trait]
impl Persistence for FileStorage {
    async fn get_all_boards(&self) -> Result<Vec<Board>> {
        self.read(|tables| tables.all_boards()).await
    }

    async fn create_board(
        &self,
        title: &str,
        description: &str,
        background: &str,
    ) -> Result<Board> {
        self.write(|tables| Ok(tables.create_board(title, description, background)))
            .await
    }

    async fn update_board(&self, id: &EntityId, update: &BoardUpdate) -> Result<Board> {
        self.write(|tables| tables.update_board(id, update)).await
    }

    async fn delete_board(&self, id: &EntityId) -> Result<()> {
        self.write(|tables| tables.delete_board(id)).await
    }

    async fn create_list(
        &self,
        board_id: &EntityId,
        title: &str,
        position: usize,
    ) -> Result<List> {
        self.write(|tables| tables.create_list(board_id, title, position))
            .await
    }

    async fn update_list(&self, id: &EntityId, update: &ListUpdate) -> Result<List> {
        self.write(|tables| tables.update_list(id, update)).await
    }

    async fn delete_list(&self, id: &EntityId) -> Result<()> {
        self.write(|tables| tables.delete_list(id)).await
    }

    async fn create_card(
        &self,
        list_id: &EntityId,
        title: &str,
        description: &str,
        position: usize,
    ) -> Result<Card> {
        self.write(|tables| tables.create_card(list_id, title, description, position))
            .await
    }

    async fn update_card(&self, id: &EntityId, update: &CardUpdate) -> Result<Card> {
        self.write(|tables| tables.update_card(id, update)).await
    }

    async fn move_card(&self, id: &EntityId, list_id: &EntityId, position: usize) -> Result<Card> {
        self.write(|tables| tables.move_card(id, list_id, position))
            .await
    }

    async fn delete_card(&self, id: &EntityId) -> Result<()> {
        self.write(|tables| tables.delete_card(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MartrelloError;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_storage_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        assert!(!storage.is_initialized().await);

        storage.initialize().await.unwrap();

        assert!(storage.is_initialized().await);
        assert!(storage.state_file().exists());
        assert!(storage.get_all_boards().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_reopening() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.initialize().await.unwrap();

        let board = storage.create_board("Sprint", "Q3", "").await.unwrap();
        let list = storage.create_list(&board.id, "To Do", 0).await.unwrap();
        storage.create_card(&list.id, "Write docs", "", 0).await.unwrap();

        let reopened = FileStorage::new(temp_dir.path());
        let boards = reopened.get_all_boards().await.unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].description, "Q3");
        assert_eq!(boards[0].lists[0].cards[0].title, "Write docs");
    }

    #[tokio::test]
    async fn test_move_card_persists_order() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.initialize().await.unwrap();

        let board = storage.create_board("Sprint", "", "").await.unwrap();
        let list = storage.create_list(&board.id, "To Do", 0).await.unwrap();
        let a = storage.create_card(&list.id, "A", "", 0).await.unwrap();
        storage.create_card(&list.id, "B", "", 1).await.unwrap();
        storage.create_card(&list.id, "C", "", 2).await.unwrap();

        storage.move_card(&a.id, &list.id, 2).await.unwrap();

        let boards = storage.get_all_boards().await.unwrap();
        let titles: Vec<&str> = boards[0].lists[0]
            .cards
            .iter()
            .map(|card| card.title.as_str())
            .collect();
        assert_eq!(titles, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.initialize().await.unwrap();

        let err = storage
            .create_list(&EntityId::new("404"), "Orphan", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, MartrelloError::NotFound { .. }));
        assert!(storage.get_all_boards().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_config_defaults_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.initialize().await.unwrap();

        let config = storage.load_config().await.unwrap();
        assert_eq!(config, CoreConfig::default());

        tokio::fs::write(storage.config_file(), "confirmation_timeout_ms = 2500\n")
            .await
            .unwrap();
        let config = storage.load_config().await.unwrap();
        assert_eq!(config.confirmation_timeout(), Duration::from_millis(2500));
    }
}
