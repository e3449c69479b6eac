use futures::TryStreamExt as _;
use sqlx::Executor;

pub const TOURS: &str = r#"
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (1, 'The Forest Hiker', 'the-forest-hiker', 5, 25, 'easy', 397, 'Forest', 'tour-1.jpg', '["2021-04-25","2021-07-20","2021-10-05"]', 0, '2024-01-01 10:00:01');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (2, 'The Sea Explorer', 'the-sea-explorer', 7, 15, 'medium', 497, 'Sea', 'tour-2.jpg', '["2021-06-19","2021-07-20","2021-08-18"]', 0, '2024-01-01 10:00:02');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (3, 'The Snow Adventurer', 'the-snow-adventurer', 4, 10, 'difficult', 997, 'Snow', 'tour-3.jpg', '["2022-01-05","2022-02-12"]', 0, '2024-01-01 10:00:03');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (4, 'The City Wanderer', 'the-city-wanderer', 9, 20, 'easy', 1197, 'City', 'tour-4.jpg', '["2021-03-11","2021-05-02","2021-06-01"]', 0, '2024-01-01 10:00:04');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (5, 'The Park Camper', 'the-park-camper', 10, 15, 'medium', 1497, 'Park', 'tour-5.jpg', '["2021-08-05","2022-03-20"]', 0, '2024-01-01 10:00:05');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (6, 'The Sports Lover', 'the-sports-lover', 14, 8, 'difficult', 2997, 'Sports', 'tour-6.jpg', '["2021-07-19","2021-09-06"]', 0, '2024-01-01 10:00:06');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (7, 'The Wine Taster', 'the-wine-taster', 5, 8, 'easy', 1997, 'Wine', 'tour-7.jpg', '["2021-02-12","2021-04-14"]', 0, '2024-01-01 10:00:07');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (8, 'The Star Gazer', 'the-star-gazer', 9, 8, 'medium', 2997, 'Stars', 'tour-8.jpg', '["2021-03-23","2021-10-25"]', 0, '2024-01-01 10:00:08');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (9, 'The Northern Lights', 'the-northern-lights', 3, 12, 'easy', 1497, 'Lights', 'tour-9.jpg', '["2021-12-16","2022-01-16"]', 0, '2024-01-01 10:00:09');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (10, 'The Desert Crosser', 'the-desert-crosser', 6, 12, 'difficult', 797, 'Desert', 'tour-10.jpg', '["2021-07-01"]', 0, '2024-01-01 10:00:10');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (11, 'The River Rafter', 'the-river-rafter', 2, 10, 'medium', 597, 'River', 'tour-11.jpg', '["2021-07-11"]', 0, '2024-01-01 10:00:11');
INSERT INTO tour (id, name, slug, duration, max_group_size, difficulty, price, summary, image_cover, start_dates, secret_tour, created)
VALUES (12, 'The Hidden Valley', 'the-hidden-valley', 3, 6, 'easy', 9997, 'Secret', 'tour-12.jpg', '["2021-07-02"]', 1, '2024-01-01 10:00:12');
"#;

pub const USERS: &str = r#"
INSERT INTO users (id, name, email, role, password) VALUES (1, 'Leo Gillespie', 'leo@example.com', 'user', 'x');
INSERT INTO users (id, name, email, role, password) VALUES (2, 'Jennifer Hardy', 'jennifer@example.com', 'user', 'x');
INSERT INTO users (id, name, email, role, password) VALUES (3, 'Kate Morrison', 'kate@example.com', 'user', 'x');
INSERT INTO users (id, name, email, role, password) VALUES (4, 'Lisa Brown', 'lisa@example.com', 'guide', 'x');
"#;

pub async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    const DB_URL: &str = "sqlite::memory:";
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    tourhub_dal::migrate(&conn).await.unwrap();

    conn.execute_many(TOURS)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    conn.execute_many(USERS)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    conn
}
