//! Doctor-location store.
//!
//! The server pushes the full location list; the store replaces its
//! contents wholesale on every push, no delta merge. Distance from the
//! user is a client-side read-time enrichment.

use std::sync::{Arc, RwLock};

use telecare_shared::DoctorLocation;

use crate::events::{EventDispatcher, Subscription};

/// Shared handle to the latest doctor-location list.
#[derive(Clone, Default)]
pub struct LocationStore {
    inner: Arc<RwLock<Vec<DoctorLocation>>>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list with a fresh push.
    pub fn replace(&self, locations: Vec<DoctorLocation>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = locations;
    }

    /// The current list as last pushed.
    pub fn snapshot(&self) -> Vec<DoctorLocation> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The current list with `distance_km` filled in from the given user
    /// position, nearest first.
    pub fn with_distance_from(&self, latitude: f64, longitude: f64) -> Vec<DoctorLocation> {
        let mut locations = self.snapshot();
        for location in &mut locations {
            location.distance_km =
                Some(haversine_km(latitude, longitude, location.latitude, location.longitude));
        }
        locations.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        locations
    }

    /// Wire this store to a dispatcher. Dropping the returned
    /// subscription detaches it.
    pub fn attach(&self, dispatcher: &EventDispatcher) -> Subscription {
        let store = self.clone();
        dispatcher.on_location_update(move |locations| {
            store.replace(locations.to_vec());
        })
    }
}

/// Great-circle distance in kilometers.
fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}
