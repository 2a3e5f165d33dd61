pub mod order;
pub mod product;
pub mod shop;
pub mod user;

pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, UnknownStatus};
pub use product::{NewProduct, Product};
pub use shop::{NewShop, Shop};
pub use user::{NewUser, User};
