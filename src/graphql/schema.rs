//! GraphQL schema: root Query and Mutation

use super::context::GraphQLContext;
use super::error::field_error;
use super::types::{parse_id, CartItemNode, ItemNode, ItemPatch, NewItem, SuccessMessage, UserNode};
use crate::models::Permission;
use crate::services::{ResetPasswordInput, SignupInput};
use juniper::{EmptySubscription, FieldResult, RootNode, ID};

pub struct Query;

#[juniper::graphql_object(context = GraphQLContext)]
impl Query {
    /// Items newest first. `first` defaults to the shop's page size.
    async fn items(
        ctx: &GraphQLContext,
        skip: Option<i32>,
        first: Option<i32>,
    ) -> FieldResult<Vec<ItemNode>> {
        let items = ctx
            .items
            .list_items(skip.map(i64::from), first.map(i64::from))
            .await
            .map_err(field_error)?;
        Ok(items.into_iter().map(ItemNode).collect())
    }

    async fn item(ctx: &GraphQLContext, id: ID) -> FieldResult<Option<ItemNode>> {
        let id = parse_id(&id)?;
        let item = ctx.items.get_item(id).await.map_err(field_error)?;
        Ok(item.map(ItemNode))
    }

    async fn items_count(ctx: &GraphQLContext) -> FieldResult<i32> {
        let count = ctx.items.count_items().await.map_err(field_error)?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    async fn search_items(ctx: &GraphQLContext, term: String) -> FieldResult<Vec<ItemNode>> {
        let items = ctx.items.search_items(&term).await.map_err(field_error)?;
        Ok(items.into_iter().map(ItemNode).collect())
    }

    /// The signed-in user, or null
    fn me(ctx: &GraphQLContext) -> Option<UserNode> {
        ctx.current_user.clone().map(UserNode)
    }

    async fn users(ctx: &GraphQLContext) -> FieldResult<Vec<UserNode>> {
        let users = ctx
            .users
            .list_users(ctx.current_user())
            .await
            .map_err(field_error)?;
        Ok(users.into_iter().map(UserNode).collect())
    }
}

pub struct Mutation;

#[juniper::graphql_object(context = GraphQLContext)]
impl Mutation {
    async fn create_item(ctx: &GraphQLContext, input: NewItem) -> FieldResult<ItemNode> {
        let item = ctx
            .items
            .create_item(ctx.current_user(), input.into())
            .await
            .map_err(field_error)?;
        Ok(ItemNode(item))
    }

    async fn update_item(ctx: &GraphQLContext, id: ID, input: ItemPatch) -> FieldResult<ItemNode> {
        let id = parse_id(&id)?;
        let item = ctx
            .items
            .update_item(ctx.current_user(), id, input.into())
            .await
            .map_err(field_error)?;
        Ok(ItemNode(item))
    }

    async fn delete_item(ctx: &GraphQLContext, id: ID) -> FieldResult<ItemNode> {
        let id = parse_id(&id)?;
        let item = ctx
            .items
            .delete_item(ctx.current_user(), id)
            .await
            .map_err(field_error)?;
        Ok(ItemNode(item))
    }

    async fn signup(
        ctx: &GraphQLContext,
        email: String,
        name: String,
        password: String,
    ) -> FieldResult<UserNode> {
        let signed_in = ctx
            .users
            .signup(SignupInput::new(name, email, password))
            .await
            .map_err(field_error)?;
        ctx.set_session(signed_in.token);
        Ok(UserNode(signed_in.user))
    }

    async fn signin(ctx: &GraphQLContext, email: String, password: String) -> FieldResult<UserNode> {
        let signed_in = ctx
            .users
            .signin(&email, &password)
            .await
            .map_err(field_error)?;
        ctx.set_session(signed_in.token);
        Ok(UserNode(signed_in.user))
    }

    fn signout(ctx: &GraphQLContext) -> SuccessMessage {
        ctx.clear_session();
        SuccessMessage::new(ctx.users.signout())
    }

    async fn request_reset(ctx: &GraphQLContext, email: String) -> FieldResult<SuccessMessage> {
        let message = ctx.users.request_reset(&email).await.map_err(field_error)?;
        Ok(SuccessMessage::new(message))
    }

    async fn reset_password(
        ctx: &GraphQLContext,
        reset_token: String,
        password: String,
        confirm_password: String,
    ) -> FieldResult<UserNode> {
        let signed_in = ctx
            .users
            .reset_password(ResetPasswordInput {
                reset_token,
                password,
                confirm_password,
            })
            .await
            .map_err(field_error)?;
        ctx.set_session(signed_in.token);
        Ok(UserNode(signed_in.user))
    }

    async fn update_permissions(
        ctx: &GraphQLContext,
        user_id: ID,
        permissions: Vec<Permission>,
    ) -> FieldResult<UserNode> {
        let user_id = parse_id(&user_id)?;
        let user = ctx
            .users
            .update_permissions(ctx.current_user(), user_id, permissions)
            .await
            .map_err(field_error)?;
        Ok(UserNode(user))
    }

    async fn add_to_cart(ctx: &GraphQLContext, id: ID) -> FieldResult<CartItemNode> {
        let item_id = parse_id(&id)?;
        let cart_item = ctx
            .carts
            .add_to_cart(ctx.current_user(), item_id)
            .await
            .map_err(field_error)?;
        Ok(CartItemNode::from(cart_item))
    }

    /// `id` is the cart row, not the item
    async fn remove_from_cart(ctx: &GraphQLContext, id: ID) -> FieldResult<CartItemNode> {
        let id = parse_id(&id)?;
        let cart_item = ctx
            .carts
            .remove_from_cart(ctx.current_user(), id)
            .await
            .map_err(field_error)?;
        Ok(CartItemNode::from(cart_item))
    }
}

pub type Schema = RootNode<'static, Query, Mutation, EmptySubscription<GraphQLContext>>;

pub fn create_schema() -> Schema {
    Schema::new(Query, Mutation, EmptySubscription::new())
}
