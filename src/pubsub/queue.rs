//! Блокирующие примитивы ожидания: ограниченная очередь и сигнал.
//!
//! Оба примитива будят ожидающих при прерывании через общий [`Interrupt`],
//! поэтому прерыватель сначала выставляет флаг, а затем вызывает `wake()`
//! под мьютексом примитива: ожидающий проверяет флаг под тем же мьютексом,
//! и пробуждение не теряется.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::{Condvar, Mutex};
use pubwait_error::SessionError;
use thiserror::Error;

/// Ёмкость очередей слушателя по умолчанию.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Причина, по которой блокирующая операция завершилась без результата.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("wait interrupted")]
    Interrupted,
    #[error("closed")]
    Closed,
}

/// Флаг прерывания ожидания.
///
/// Флаг потребляется тем ожиданием, которое он прервал.
#[derive(Debug, Default)]
pub struct Interrupt(AtomicBool);

/// Ограниченная FIFO-очередь с блокирующими `push`/`pop`.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Двоичный сигнал со счётчиком срабатываний.
///
/// Ожидающий освобождается, когда сигнал сработал хотя бы раз после
/// запомненного поколения.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct SignalState {
    generation: u64,
    closed: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Сбрасывает флаг и возвращает его прежнее значение.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl<T> BoundedQueue<T> {
    /// Создаёт очередь заданной ёмкости.
    ///
    /// # Panics
    /// Паникует при `capacity == 0`: такая очередь не примет ни одного
    /// элемента и заблокирует производителя навсегда.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Кладёт элемент в конец очереди, блокируясь, пока очередь полна.
    ///
    /// После `close()` элемент отбрасывается и возвращается
    /// `WaitError::Closed`.
    pub fn push(
        &self,
        item: T,
    ) -> Result<(), WaitError> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.closed {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(WaitError::Closed);
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Забирает самый старый элемент, блокируясь, пока очередь пуста.
    ///
    /// При прерывании ничего не извлекает.
    pub fn pop(
        &self,
        interrupt: &Interrupt,
    ) -> Result<T, WaitError> {
        let mut state = self.state.lock();
        loop {
            if interrupt.take() {
                return Err(WaitError::Interrupted);
            }
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Ok(item);
            }
            if state.closed {
                return Err(WaitError::Closed);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Неблокирующий вариант `pop`.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = state.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Будит всех потребителей, чтобы они перепроверили флаг прерывания.
    pub fn wake(&self) {
        let _state = self.state.lock();
        self.not_empty.notify_all();
    }

    /// Закрывает очередь: заблокированные производители освобождаются,
    /// буфер очищается.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.items.clear();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Срабатывание: освобождает всех текущих ожидающих.
    pub fn fire(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        self.cond.notify_all();
    }

    /// Текущее поколение (число срабатываний).
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Ждёт срабатывания после начала вызова.
    pub fn wait(
        &self,
        interrupt: &Interrupt,
    ) -> Result<u64, WaitError> {
        let seen = self.generation();
        self.wait_after(seen, interrupt)
    }

    /// Ждёт, пока поколение не станет больше `seen`.
    pub fn wait_after(
        &self,
        seen: u64,
        interrupt: &Interrupt,
    ) -> Result<u64, WaitError> {
        let mut state = self.state.lock();
        loop {
            if interrupt.take() {
                return Err(WaitError::Interrupted);
            }
            if state.generation > seen {
                return Ok(state.generation);
            }
            if state.closed {
                return Err(WaitError::Closed);
            }
            self.cond.wait(&mut state);
        }
    }

    pub fn wake(&self) {
        let _state = self.state.lock();
        self.cond.notify_all();
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl From<WaitError> for SessionError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Interrupted => SessionError::Interrupted,
            WaitError::Closed => SessionError::Closed,
        }
    }
}
