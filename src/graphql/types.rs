//! GraphQL object and input types
//!
//! Domain models stay free of GraphQL concerns; each exposed type wraps one.
//! Money is exposed in cents as a GraphQL `Int`.

use super::context::GraphQLContext;
use super::error::{coded_error, field_error, BAD_USER_INPUT, INTERNAL_SERVER_ERROR};
use crate::models::{CartItem, CartLine, CreateItemInput, Item, Permission, UpdateItemInput, User};
use juniper::{FieldResult, GraphQLInputObject, GraphQLObject, ID};

/// Parse a GraphQL `ID` into a database id
pub fn parse_id(id: &ID) -> FieldResult<i64> {
    let raw: &str = id;
    raw.parse::<i64>()
        .map_err(|_| coded_error(format!("Invalid ID: {}", raw), BAD_USER_INPUT))
}

fn to_id(id: i64) -> ID {
    ID::new(id.to_string())
}

fn to_int(value: i64) -> FieldResult<i32> {
    i32::try_from(value).map_err(|_| {
        tracing::error!(value, "Value does not fit a GraphQL Int");
        coded_error("Value out of range", INTERNAL_SERVER_ERROR)
    })
}

pub struct UserNode(pub User);

#[juniper::graphql_object(name = "User", context = GraphQLContext)]
impl UserNode {
    fn id(&self) -> ID {
        to_id(self.0.id)
    }

    fn name(&self) -> String {
        self.0.name.clone()
    }

    fn email(&self) -> String {
        self.0.email.clone()
    }

    fn permissions(&self) -> Vec<Permission> {
        self.0.permissions.clone()
    }

    /// Cart rows with their items, oldest first
    async fn cart(&self, ctx: &GraphQLContext) -> FieldResult<Vec<CartItemNode>> {
        let lines = ctx.carts.cart_for(self.0.id).await.map_err(field_error)?;
        Ok(lines.into_iter().map(CartItemNode::from).collect())
    }

    /// Sum of quantity times price, in cents
    async fn cart_total(&self, ctx: &GraphQLContext) -> FieldResult<i32> {
        let total = ctx.carts.cart_total(self.0.id).await.map_err(field_error)?;
        to_int(total)
    }
}

pub struct ItemNode(pub Item);

#[juniper::graphql_object(name = "Item", context = GraphQLContext)]
impl ItemNode {
    fn id(&self) -> ID {
        to_id(self.0.id)
    }

    fn title(&self) -> String {
        self.0.title.clone()
    }

    fn description(&self) -> String {
        self.0.description.clone()
    }

    fn image(&self) -> Option<String> {
        self.0.image.clone()
    }

    fn large_image(&self) -> Option<String> {
        self.0.large_image.clone()
    }

    /// Price in cents
    fn price(&self) -> FieldResult<i32> {
        to_int(self.0.price)
    }

    fn owner_id(&self) -> ID {
        to_id(self.0.user_id)
    }
}

/// A cart row. The item is preloaded when the row came from a cart listing.
pub struct CartItemNode {
    cart_item: CartItem,
    item: Option<Item>,
}

impl From<CartItem> for CartItemNode {
    fn from(cart_item: CartItem) -> Self {
        Self {
            cart_item,
            item: None,
        }
    }
}

impl From<CartLine> for CartItemNode {
    fn from(line: CartLine) -> Self {
        Self {
            cart_item: line.cart_item,
            item: Some(line.item),
        }
    }
}

#[juniper::graphql_object(name = "CartItem", context = GraphQLContext)]
impl CartItemNode {
    fn id(&self) -> ID {
        to_id(self.cart_item.id)
    }

    fn quantity(&self) -> FieldResult<i32> {
        to_int(self.cart_item.quantity)
    }

    async fn item(&self, ctx: &GraphQLContext) -> FieldResult<Option<ItemNode>> {
        if let Some(item) = &self.item {
            return Ok(Some(ItemNode(item.clone())));
        }
        let item = ctx
            .carts
            .item_for(&self.cart_item)
            .await
            .map_err(field_error)?;
        Ok(item.map(ItemNode))
    }
}

#[derive(Debug, Clone, GraphQLObject)]
pub struct SuccessMessage {
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, GraphQLInputObject)]
#[graphql(name = "CreateItemInput")]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    /// Price in cents
    pub price: i32,
}

impl From<NewItem> for CreateItemInput {
    fn from(input: NewItem) -> Self {
        Self {
            title: input.title,
            description: input.description,
            image: input.image,
            large_image: input.large_image,
            price: i64::from(input.price),
        }
    }
}

#[derive(Debug, Clone, Default, GraphQLInputObject)]
#[graphql(name = "UpdateItemInput")]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: Option<i32>,
}

impl From<ItemPatch> for UpdateItemInput {
    fn from(patch: ItemPatch) -> Self {
        Self {
            title: patch.title,
            description: patch.description,
            image: patch.image,
            large_image: patch.large_image,
            price: patch.price.map(i64::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(&ID::new("42")).unwrap(), 42);
        let err = parse_id(&ID::new("abc")).unwrap_err();
        assert_eq!(err.message(), "Invalid ID: abc");
    }

    #[test]
    fn test_to_int_rejects_overflow() {
        assert_eq!(to_int(2500).unwrap(), 2500);
        assert!(to_int(i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn test_item_patch_converts_price() {
        let patch = ItemPatch {
            price: Some(1999),
            ..Default::default()
        };
        let update: UpdateItemInput = patch.into();
        assert_eq!(update.price, Some(1999));
        assert!(update.title.is_none());
    }
}
