pub mod cart;
pub mod cart_item;
pub mod customer_address;
pub mod order;
pub mod order_item;
pub mod order_status_update;
pub mod product;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use customer_address::Entity as CustomerAddress;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use order_status_update::Entity as OrderStatusUpdate;
pub use product::Entity as Product;
