use anyhow::{Result, anyhow};
use reqwest::Url;
use serde_json::json;
use tourhub_dal::{review::Review, tour::Tour};
use tracing::info;

use crate::extend_url;

pub fn tour_payload(name: &str, price: f64, difficulty: &str, start_dates: &[&str]) -> serde_json::Value {
    json!({
        "name": name,
        "duration": 5,
        "max_group_size": 10,
        "difficulty": difficulty,
        "price": price,
        "summary": format!("Summary of {name}"),
        "image_cover": "cover.jpg",
        "start_dates": start_dates,
    })
}

pub async fn create_tour(
    client: &reqwest::Client,
    base_url: &Url,
    payload: &serde_json::Value,
) -> Result<Tour> {
    let api_url = base_url.join("api/tours")?;
    let response = client.post(api_url).json(payload).send().await?;
    info!("Create tour response: {:#?}", response);
    if response.status().as_u16() != 201 {
        return Err(anyhow!("Tour not created, status {}", response.status()));
    }
    let tour: Tour = response.json().await?;
    Ok(tour)
}

pub async fn create_review(
    client: &reqwest::Client,
    base_url: &Url,
    tour_id: i64,
    rating: i64,
    text: &str,
) -> Result<Review> {
    let api_url = extend_url(&extend_url(&base_url.join("api/tours")?, tour_id), "reviews");
    let response = client
        .post(api_url)
        .json(&json!({"review": text, "rating": rating}))
        .send()
        .await?;
    info!("Create review response: {:#?}", response);
    if response.status().as_u16() != 201 {
        return Err(anyhow!("Review not created, status {}", response.status()));
    }
    let review: Review = response.json().await?;
    Ok(review)
}
