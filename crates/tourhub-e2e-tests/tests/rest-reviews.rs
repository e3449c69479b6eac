use serde_json::{Value, json};
use tourhub_dal::{rating::RatingSummary, review::Review, tour::Tour};
use tourhub_e2e_tests::{
    TestUser, extend_url, launch_env, login, prepare_env,
    rest::{create_review, create_tour, tour_payload},
};
use tracing::info;
use tracing_test::traced_test;

async fn fetch_tour(client: &reqwest::Client, tour_url: &reqwest::Url) -> Tour {
    let response = client.get(tour_url.clone()).send().await.unwrap();
    assert!(response.status().is_success());
    response.json().await.unwrap()
}

#[tokio::test]
#[traced_test]
async fn test_reviews() {
    let (args, _config_guard) = prepare_env("test_reviews").await.unwrap();
    let base_url = args.base_url.clone();
    let (admin, _) = launch_env(args, TestUser::Admin).await.unwrap();

    let tour = create_tour(
        &admin,
        &base_url,
        &tour_payload("The Forest Hiker", 397.0, "easy", &["2021-04-25"]),
    )
    .await
    .unwrap();
    let tour_url = extend_url(&base_url.join("api/tours").unwrap(), tour.id);
    let reviews_url = base_url.join("api/reviews").unwrap();

    let (user, user_token) = login(&base_url, TestUser::User).await.unwrap();
    let (other, other_token) = login(&base_url, TestUser::OtherUser).await.unwrap();

    let review = create_review(&user, &base_url, tour.id, 3, "Nice, but rainy")
        .await
        .unwrap();
    assert_eq!(review.tour_id, tour.id);
    assert_eq!(review.user_id, user_token.user.id);
    assert_eq!(review.user_name, TestUser::User.name());

    let response = other
        .post(reviews_url.clone())
        .json(&json!({"review": "Amazing", "rating": 5, "tour_id": tour.id}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let other_review: Review = response.json().await.unwrap();
    assert_eq!(other_review.user_id, other_token.user.id);

    let rated = fetch_tour(&admin, &tour_url).await;
    assert_eq!(rated.ratings_quantity, 2);
    assert_eq!(rated.ratings_average, 4.0);

    // one review per user and tour
    let response = user
        .post(extend_url(&tour_url, "reviews"))
        .json(&json!({"review": "Again", "rating": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = user
        .post(reviews_url.clone())
        .json(&json!({"review": "Where?", "rating": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = user
        .post(reviews_url.clone())
        .json(&json!({"review": "Ghost tour", "rating": 1, "tour_id": 9999}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = user
        .post(reviews_url.clone())
        .json(&json!({"review": "Too good", "rating": 6, "tour_id": tour.id}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);

    let response = admin
        .post(extend_url(&tour_url, "reviews"))
        .json(&json!({"review": "Admin opinion", "rating": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = user
        .get(extend_url(&tour_url, "reviews"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let page: Value = response.json().await.unwrap();
    info!("Reviews: {:#?}", page);
    assert_eq!(page["total"], 2);
    assert_eq!(page["rows"][0]["user_name"], TestUser::User.name());

    let mut url = reviews_url.clone();
    url.set_query(Some("rating[gte]=4"));
    let page: Value = user.get(url).send().await.unwrap().json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["rows"][0]["review"], "Amazing");

    let review_url = extend_url(&reviews_url, review.id);

    let response = other
        .patch(review_url.clone())
        .json(&json!({"rating": 1, "version": review.version}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = user
        .patch(review_url.clone())
        .json(&json!({"rating": 5, "version": review.version}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let updated: Review = response.json().await.unwrap();
    assert_eq!(updated.rating, 5);
    assert_eq!(updated.review, "Nice, but rainy");

    let response = user
        .patch(review_url.clone())
        .json(&json!({"rating": 4, "version": review.version}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let rated = fetch_tour(&admin, &tour_url).await;
    assert_eq!(rated.ratings_quantity, 2);
    assert_eq!(rated.ratings_average, 5.0);

    let other_url = extend_url(&reviews_url, other_review.id);
    let response = user.delete(other_url.clone()).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let response = admin.delete(other_url.clone()).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);
    let response = admin.get(other_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let rated = fetch_tour(&admin, &tour_url).await;
    assert_eq!(rated.ratings_quantity, 1);
    assert_eq!(rated.ratings_average, 5.0);

    let response = user.delete(review_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = admin
        .post(extend_url(&tour_url, "ratings"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let summary: RatingSummary = response.json().await.unwrap();
    assert_eq!(summary.tour_id, tour.id);
    assert_eq!(summary.ratings_quantity, 0);
    assert_eq!(summary.ratings_average, 4.5);

    let response = admin
        .post(base_url.join("api/tours/9999/ratings").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
