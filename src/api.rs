//! Server endpoint paths shared by the client queue and the router.

pub const GET_TASKS: &str = "/api/getTasks";
pub const ADD_TASK: &str = "/api/addTask";
pub const UPDATE_TASK: &str = "/api/updateTask";
pub const DELETE_TASK: &str = "/api/deleteTask";
pub const GET_PROJECTS: &str = "/api/getProjects";
pub const ADD_PROJECT: &str = "/api/addProject";
pub const UPDATE_PROJECT: &str = "/api/updateProject";
pub const DELETE_PROJECT: &str = "/api/deleteProject";
