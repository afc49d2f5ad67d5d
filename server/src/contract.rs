//! Contract bindings
//!
//! The parts of `FlightSuretyApp` and `FlightSuretyData` used by the oracle
//! server and the query client. Calls and events are encoded through these
//! generated types; gateways only ever see raw calldata and log data.

use alloy::sol;

sol! {
    #[sol(all_derives)]
    interface FlightSuretyApp {
        event OracleRequest(uint8 index, address airline, string flight, uint256 timestamp);

        function REGISTRATION_FEE() external view returns (uint256);
        function registerOracle() external payable;
        function getMyIndexes() external view returns (uint8[3]);
        function submitOracleResponse(
            uint8 index,
            address airline,
            string calldata flight,
            uint256 timestamp,
            uint8 statusCode
        ) external;
        function fetchFlightStatus(address airline, string calldata flight, uint256 timestamp) external;

        function isOperational() external view returns (bool);
        function getBalance() external view returns (uint256);
        function withdrawBalance() external;
        function getFlightsCount() external view returns (uint256);
        function getFlight(uint256 index)
            external
            view
            returns (address airline, string memory flight, uint256 timestamp, uint8 statusCode);
        function buyInsurance(address airline, string calldata flight, uint256 timestamp) external payable;
        function claimInsurance(address airline, string calldata flight, uint256 timestamp) external;
        function getInsurance(string calldata flight)
            external
            view
            returns (uint256 amount, uint256 payoutAmount, uint8 state);
    }
}

sol! {
    #[sol(all_derives)]
    interface FlightSuretyData {
        function getAppContractAuthorizationStatus(address appContract) external view returns (bool);
        function setAppContractAuthorizationStatus(address appContract, bool status) external;
    }
}
