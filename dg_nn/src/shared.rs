//! A network shared between threads.
//!
//! [`SharedNetwork`] serializes steps behind one mutex held for the whole
//! step. A step attempted while another holds the network is rejected with
//! [`Error::InvalidPhaseTransition`] instead of waiting.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use dg_core::Decimal;

use crate::error::{Error, Result};
use crate::network::{NeuralNetwork, Phase, PhaseWatch};

#[derive(Debug)]
pub struct SharedNetwork {
    inner: Mutex<NeuralNetwork>,
    watch: PhaseWatch,
}

impl SharedNetwork {
    pub fn new(network: NeuralNetwork) -> Self {
        SharedNetwork {
            watch: network.phase_watch(),
            inner: Mutex::new(network),
        }
    }

    /// Run one step and return the loss. Never blocks on a busy network.
    pub fn step(&self, input: &[Decimal], expectation: &[Decimal]) -> Result<Decimal> {
        let mut network = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                tracing::debug!(phase = %self.watch.get(), "step rejected, network busy");
                return Err(Error::InvalidPhaseTransition {
                    current: self.watch.get(),
                    expected: Phase::Static,
                });
            }
        };

        let loss = network.step(input, expectation)?;
        Ok(network.tape().data(loss)?)
    }

    /// Phase of the network, readable while a step is running.
    pub fn phase(&self) -> Phase {
        self.watch.get()
    }

    /// Exclusive access to the network, waiting for a running step to finish.
    pub fn lock(&self) -> MutexGuard<'_, NeuralNetwork> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn into_inner(self) -> NeuralNetwork {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
