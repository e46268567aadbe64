use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::BlogPost,
    routes::shipments::page_offset,
    schema::blog_posts,
    state::AppState,
    utils::text::truncate_chars,
};

pub const BLOG_PAGE_SIZE: i64 = 10;
const DESCRIPTION_CHARS: usize = 155;

#[derive(Deserialize)]
pub struct BlogListQuery {
    pub page: Option<i64>,
}

#[derive(Serialize)]
pub struct BlogSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub view_count: i32,
    pub created_at: NaiveDateTime,
    pub published_at: Option<NaiveDateTime>,
}

impl From<BlogPost> for BlogSummary {
    fn from(post: BlogPost) -> Self {
        Self {
            description: describe(&post).to_string(),
            id: post.id,
            title: post.title,
            slug: post.slug,
            view_count: post.view_count,
            created_at: post.created_at,
            published_at: post.published_at,
        }
    }
}

#[derive(Serialize)]
pub struct BlogPage {
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<BlogSummary>,
}

#[derive(Serialize)]
pub struct BlogDetail {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub canonical: String,
    pub post: BlogPost,
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> AppResult<Json<BlogPage>> {
    let page = query.page.unwrap_or(1).max(1);
    let mut conn = state.db()?;

    let total_count = blog_posts::table
        .filter(blog_posts::is_published.eq(true))
        .count()
        .get_result(&mut conn)?;
    let posts: Vec<BlogPost> = blog_posts::table
        .filter(blog_posts::is_published.eq(true))
        .order(blog_posts::created_at.desc())
        .limit(BLOG_PAGE_SIZE)
        .offset(page_offset(page, BLOG_PAGE_SIZE))
        .load(&mut conn)?;

    Ok(Json(BlogPage {
        total_count,
        page,
        page_size: BLOG_PAGE_SIZE,
        results: posts.into_iter().map(BlogSummary::from).collect(),
    }))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<BlogDetail>> {
    let mut conn = state.db()?;
    let post: BlogPost = diesel::update(
        blog_posts::table
            .filter(blog_posts::slug.eq(&slug))
            .filter(blog_posts::is_published.eq(true)),
    )
    .set(blog_posts::view_count.eq(blog_posts::view_count + 1))
    .get_result(&mut conn)?;

    Ok(Json(BlogDetail {
        title: post.title.clone(),
        description: describe(&post).to_string(),
        keywords: post.meta_keywords.clone(),
        canonical: format!("/blog/{}/", post.slug),
        post,
    }))
}

/// Meta description, else the opening of the content.
fn describe(post: &BlogPost) -> &str {
    if post.meta_description.trim().is_empty() {
        truncate_chars(&post.content, DESCRIPTION_CHARS)
    } else {
        &post.meta_description
    }
}
