/// Per-job handle produced by [`ExecutorProvider::acquire`](crate::ExecutorProvider::acquire)
/// and consumed by [`ExecutorProvider::release`](crate::ExecutorProvider::release).
///
/// Not `Clone`: a handle is released at most once.
#[derive(Debug, PartialEq, Eq)]
pub enum ExecutorData {
    /// Capacity reserved on an autoscaled fleet.
    Acquisition(AcquisitionRef),
}

/// Reservation on the fleet scaler of one runner token.
///
/// Unbound until the executor picks the key it acquires the instance under.
#[derive(Debug, PartialEq, Eq)]
pub struct AcquisitionRef {
    token: String,
    key: Option<String>,
}

impl AcquisitionRef {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            key: None,
        }
    }

    /// Runner token whose scaler holds the reservation.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.key.is_some()
    }

    /// Record the key the instance was acquired under.
    pub fn bind(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }
}

impl ExecutorData {
    pub fn acquisition(&self) -> Option<&AcquisitionRef> {
        match self {
            ExecutorData::Acquisition(r) => Some(r),
        }
    }

    pub fn acquisition_mut(&mut self) -> Option<&mut AcquisitionRef> {
        match self {
            ExecutorData::Acquisition(r) => Some(r),
        }
    }
}
