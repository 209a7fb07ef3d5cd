//! Ordered appointment list with write-through persistence
//!
//! The list order is the visiting order. Every mutation builds the next
//! list, writes it to storage and only then replaces the in-memory copy,
//! so a failed write leaves both sides on the previous state.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::defaults::STORAGE_KEY;
use crate::error::{PlannerError, PlannerResult};
use crate::services::storage::Storage;
use crate::types::{Appointment, ResolvedAddress};

pub struct StopListManager {
    appointments: Vec<Appointment>,
    storage: Box<dyn Storage>,
    /// Bumped on every successful mutation
    revision: u64,
}

impl StopListManager {
    /// Restore the list saved in `storage`, or start empty
    pub fn load(storage: Box<dyn Storage>) -> Self {
        let appointments = match storage.get_item(STORAGE_KEY) {
            Ok(Some(raw)) => parse_saved(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not read saved appointments: {:#}", e);
                Vec::new()
            }
        };
        info!("Loaded {} saved appointments", appointments.len());

        Self {
            appointments,
            storage,
            revision: 0,
        }
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: i64) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    /// Append a stop with a fresh id
    pub fn add(&mut self, resolved: ResolvedAddress) -> PlannerResult<Appointment> {
        self.add_at(resolved, Utc::now().timestamp_millis())
    }

    fn add_at(&mut self, resolved: ResolvedAddress, now_ms: i64) -> PlannerResult<Appointment> {
        let appointment = Appointment {
            id: self.next_id(now_ms),
            address: resolved.address,
            lat: resolved.coordinates.lat,
            lng: resolved.coordinates.lng,
        };

        let mut next = self.appointments.clone();
        next.push(appointment.clone());
        self.commit(next)?;

        debug!("Added appointment {} ({})", appointment.id, appointment.address);
        Ok(appointment)
    }

    /// Creation timestamp, bumped past the largest existing id if needed
    fn next_id(&self, now_ms: i64) -> i64 {
        match self.appointments.iter().map(|a| a.id).max() {
            Some(max) if now_ms <= max => max + 1,
            _ => now_ms,
        }
    }

    /// Delete by id. Returns false (and writes nothing) when no such id exists.
    pub fn remove(&mut self, id: i64) -> PlannerResult<bool> {
        if self.get(id).is_none() {
            debug!("Remove ignored, no appointment {}", id);
            return Ok(false);
        }

        let next: Vec<Appointment> = self
            .appointments
            .iter()
            .filter(|a| a.id != id)
            .cloned()
            .collect();
        self.commit(next)?;

        debug!("Removed appointment {}", id);
        Ok(true)
    }

    /// Move the stop at `from` so that it ends up at `to`
    pub fn reorder(&mut self, from: usize, to: usize) -> PlannerResult<()> {
        let len = self.appointments.len();
        for index in [from, to] {
            if index >= len {
                return Err(PlannerError::InvalidIndex { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        let mut next = self.appointments.clone();
        let moved = next.remove(from);
        next.insert(to, moved);
        self.commit(next)?;

        debug!("Moved appointment from position {} to {}", from, to);
        Ok(())
    }

    /// Reorder by a permutation from the routing service: `order[i]` is the
    /// current index of the stop that should be visited i-th.
    pub fn apply_optimized_order(&mut self, order: &[usize]) -> PlannerResult<()> {
        let len = self.appointments.len();
        if !is_permutation(order, len) {
            return Err(PlannerError::InvalidPermutation {
                order: order.to_vec(),
                len,
            });
        }

        let next: Vec<Appointment> = order
            .iter()
            .map(|&index| self.appointments[index].clone())
            .collect();
        self.commit(next)?;

        debug!("Applied optimized order {:?}", order);
        Ok(())
    }

    pub fn clear(&mut self) -> PlannerResult<()> {
        self.commit(Vec::new())?;
        info!("Cleared all appointments");
        Ok(())
    }

    fn commit(&mut self, next: Vec<Appointment>) -> PlannerResult<()> {
        let payload =
            serde_json::to_string(&next).map_err(|e| PlannerError::Storage(e.to_string()))?;
        self.storage
            .set_item(STORAGE_KEY, &payload)
            .map_err(|e| PlannerError::Storage(format!("{:#}", e)))?;

        self.appointments = next;
        self.revision += 1;
        Ok(())
    }
}

fn parse_saved(raw: &str) -> Vec<Appointment> {
    let saved: Vec<Appointment> = match serde_json::from_str(raw) {
        Ok(saved) => saved,
        Err(e) => {
            warn!("Saved appointments are malformed, starting empty: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    saved
        .into_iter()
        .filter(|a| {
            let fresh = seen.insert(a.id);
            if !fresh {
                warn!("Dropping saved appointment with duplicate id {}", a.id);
            }
            fresh
        })
        .collect()
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &index in order {
        if index >= len || seen[index] {
            return false;
        }
        seen[index] = true;
    }
    true
}
