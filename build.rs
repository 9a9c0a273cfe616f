fn main() {
    dotenvy::dotenv().ok();
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed=RELAYGATE_CONFIG");
}
