//! Синхронизатор событий подписки.
//!
//! - `message`, `status`: данные, которые доставляет транспорт, и
//!   классификация переходов статуса.
//! - `queue`: блокирующие примитивы (ограниченная очередь, сигнал,
//!   прерывание).
//! - `transport`: граница с транспортным клиентом; `local` — его
//!   внутрипроцессная реализация.
//! - `relay`: слушатель сессии, публикующий классификацию статуса.
//! - `listener`: слушатель одного запроса с блокирующими ожиданиями.
//! - `registry`: операции над набором подписок без собственного состояния.

pub mod listener;
pub mod local;
pub mod message;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod status;
pub mod transport;

pub use listener::*;
pub use local::*;
pub use message::*;
pub use queue::*;
pub use registry::*;
pub use relay::*;
pub use status::*;
pub use transport::*;
