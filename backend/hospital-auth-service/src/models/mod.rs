/// Data models for authentication
pub mod user;

pub use user::{
    ChangePasswordRequest, LoginRequest, LoginResponse, LogoutRequest, MessageResponse, NewUser,
    PasswordExpiryResponse, ProfileChanges, RefreshTokenRequest, RegisterRequest,
    UpdateProfileRequest, UpdateRoleRequest, User, UserProfile,
};
