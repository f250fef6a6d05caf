use crate::errors::AppError;
use crate::filter::record_date;
use crate::models::{AppData, NewAppointment, Record};
use crate::session::SessionManager;
use crate::storage::persist_data;
use crate::store::{LocalClock, RecordStore};
use crate::sync::{Collection, RecordSource};
use crate::ui::AppointmentsView;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tracing::{error, info};

pub type SharedStore = Arc<Mutex<RecordStore<AppointmentsView, LocalClock>>>;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    /// Tests and notes. Appointments live in `collection`. Every write,
    /// including appointment writes, happens while this lock is held.
    pub data: Arc<Mutex<AppData>>,
    pub collection: Arc<Collection>,
    pub store: SharedStore,
    pub session: Arc<SessionManager<AppointmentsView, LocalClock>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, mut data: AppData) -> Self {
        let collection = Arc::new(Collection::new(std::mem::take(&mut data.appointments)));
        let store = Arc::new(Mutex::new(RecordStore::new(
            AppointmentsView::default(),
            LocalClock,
        )));
        let source: Arc<dyn RecordSource> = collection.clone();
        let session = Arc::new(SessionManager::new(source, Arc::clone(&store)));

        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            collection,
            store,
            session,
        }
    }

    /// Saves a new appointment. The collection and its subscribers only see
    /// it once the data file has been written.
    pub async fn create_appointment(
        &self,
        owner_id: &str,
        draft: NewAppointment,
        created_at: String,
    ) -> Result<Record, AppError> {
        let data = self.data.lock().await;
        let (record, next) = self.collection.with_inserted(owner_id, draft, created_at);
        record_date(&record)?;

        self.write(&data, next.clone(), owner_id).await?;
        self.collection.replace(owner_id, next);
        info!(owner_id, id = %record.id, "appointment created");
        Ok(record)
    }

    pub async fn delete_appointment(&self, owner_id: &str, id: &str) -> Result<(), AppError> {
        let data = self.data.lock().await;
        let next = self
            .collection
            .without(owner_id, id)
            .ok_or_else(|| AppError::not_found(format!("appointment {id} not found")))?;

        self.write(&data, next.clone(), owner_id).await?;
        self.collection.replace(owner_id, next);
        info!(owner_id, id, "appointment deleted");
        Ok(())
    }

    /// Runs `change` against a copy of the tests and notes. The copy replaces
    /// the shared data only after it has been written.
    pub async fn update_data<T, F>(&self, owner_id: &str, change: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut AppData) -> Result<T, AppError>,
    {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let value = change(&mut next)?;

        self.write(&next, self.collection.records(), owner_id).await?;
        *data = next;
        Ok(value)
    }

    /// Writes the data file. On failure the owner's live view is told its
    /// latest change was not saved.
    async fn write(
        &self,
        data: &AppData,
        appointments: Vec<Record>,
        owner_id: &str,
    ) -> Result<(), AppError> {
        let file = AppData {
            appointments,
            tests: data.tests.clone(),
            notes: data.notes.clone(),
        };
        let result = persist_data(&self.data_path, &file).await;

        if let Err(err) = &result {
            error!(status = %err.status, "failed to persist data: {}", err.message);
            self.collection
                .publish_error(owner_id, "latest changes could not be saved");
        }
        result
    }
}
