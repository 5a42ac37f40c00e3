use serde_json::Value;

use super::test_app::TestApp;

pub const PASSWORD: &str = "Password123!";
pub const ADULT_BIRTH_DATE: &str = "1995-06-15";

pub struct SeededUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Two users who liked each other.
pub struct SeededMatch {
    pub match_id: String,
    pub first: SeededUser,
    pub second: SeededUser,
}

/// Unwraps the `data` field of a success envelope.
pub async fn data(resp: reqwest::Response) -> Value {
    let status = resp.status();
    let json: Value = resp.json().await.expect("Response was not JSON");
    assert!(
        status.is_success() && json["success"] == true,
        "Expected success envelope, got {}: {}",
        status,
        json
    );
    json["data"].clone()
}

impl TestApp {
    /// Register an adult user and return their auth info.
    pub async fn register_user(&self, email: &str, display_name: &str) -> SeededUser {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&serde_json::json!({
                "email": email,
                "password": PASSWORD,
                "display_name": display_name,
                "birth_date": ADULT_BIRTH_DATE,
                "gender": "woman",
                "interested_in": ["man", "woman"],
            }))
            .send()
            .await
            .expect("Register request failed");

        let status = resp.status().as_u16();
        let json: Value = resp.json().await.expect("Register response was not JSON");
        assert_eq!(status, 201, "Register failed: {}", json);

        let json = json["data"].clone();
        SeededUser {
            id: json["user"]["id"].as_str().unwrap().to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            access_token: json["access_token"].as_str().unwrap().to_string(),
            refresh_token: json["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Login a user and return the raw response.
    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// Create an authenticated request with the given token.
    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub async fn swipe(&self, swiper: &SeededUser, target: &SeededUser, action: &str) -> Value {
        let resp = self
            .auth_post("/api/matches/swipe", &swiper.access_token)
            .json(&serde_json::json!({ "target_id": target.id, "action": action }))
            .send()
            .await
            .expect("Swipe request failed");
        data(resp).await
    }

    pub async fn set_location(&self, user: &SeededUser, lng: f64, lat: f64) {
        let resp = self
            .auth_put("/api/users/me/location", &user.access_token)
            .json(&serde_json::json!({ "lng": lng, "lat": lat }))
            .send()
            .await
            .expect("Location request failed");
        assert_eq!(resp.status().as_u16(), 200);
    }

    /// Register two users and have them like each other.
    pub async fn seed_match(&self, prefix: &str) -> SeededMatch {
        let first = self
            .register_user(&format!("{prefix}-a@test.com"), &format!("{prefix} A"))
            .await;
        let second = self
            .register_user(&format!("{prefix}-b@test.com"), &format!("{prefix} B"))
            .await;

        let swipe = self.swipe(&first, &second, "like").await;
        assert_eq!(swipe["matched"], false);
        let swipe = self.swipe(&second, &first, "like").await;
        assert_eq!(swipe["matched"], true);

        SeededMatch {
            match_id: swipe["match"]["id"].as_str().unwrap().to_string(),
            first,
            second,
        }
    }
}
