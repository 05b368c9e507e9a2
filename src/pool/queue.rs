//! # Cola FIFO de Tareas
//! src/pool/queue.rs
//!
//! Cola thread-safe compartida entre el acceptor (productor) y los workers
//! (consumidores). Un solo `Mutex` protege el estado; dos condvars despiertan
//! a consumidores (`not_empty`) y a productores bloqueados (`not_full`).

use crate::config::OverflowPolicy;
use crate::error::DispatchError;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Estado protegido por el mutex
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Cola FIFO, opcionalmente acotada
pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,

    /// Notifica a los workers cuando llega una tarea o se cierra la cola
    not_empty: Condvar,

    /// Notifica a productores bloqueados cuando se libera un hueco
    not_full: Condvar,

    /// `None` = sin límite
    capacity: Option<usize>,

    overflow: OverflowPolicy,
}

impl<T> TaskQueue<T> {
    /// Cola sin límite: `push` nunca bloquea
    pub fn unbounded() -> Self {
        Self::build(None, OverflowPolicy::Block)
    }

    /// Cola acotada con la política de desborde indicada
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self::build(Some(capacity.max(1)), overflow)
    }

    fn build(capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            overflow,
        }
    }

    // Una tarea que hace panic nunca corre con el lock tomado, así que el
    // estado sigue siendo consistente aunque el mutex quede envenenado.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_full(&self, state: &QueueState<T>) -> bool {
        self.capacity.is_some_and(|cap| state.items.len() >= cap)
    }

    /// Encola una tarea al final
    ///
    /// Con cola llena: `Block` espera un hueco, `Reject` devuelve `QueueFull`.
    /// Con cola cerrada devuelve `ShutDown`.
    pub fn push(&self, item: T) -> Result<(), DispatchError> {
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(DispatchError::ShutDown);
            }
            if !self.is_full(&state) {
                break;
            }
            match self.overflow {
                OverflowPolicy::Reject => {
                    return Err(DispatchError::QueueFull {
                        capacity: self.capacity.unwrap_or_default(),
                    });
                }
                OverflowPolicy::Block => {
                    state = self
                        .not_full
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            }
        }

        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Desencola la tarea más antigua
    ///
    /// Bloquea hasta que haya una tarea. Retorna `None` solo cuando la cola
    /// está cerrada y vacía, así que las tareas pendientes se drenan antes.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Cierra la cola: no acepta más tareas y despierta a todos
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retorna la capacidad máxima (`None` = sin límite)
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
